use feeder_config::Config;
use rstest::rstest;
use std::io::Write;

#[rstest]
#[case::zero_samples("[sensor]\nsample_count = 0\n", "sample_count")]
#[case::one_sample("[sensor]\nsample_count = 1\n", "sample_count")]
#[case::bad_noise_limit("[sensor]\nnoise_limit_g = 0.0\n", "noise_limit_g")]
#[case::zero_gain("[sensor]\ngain_bowl_g_per_count = 0.0\n", "gain_bowl")]
#[case::jam_fraction_too_big("[feed]\njam_fraction = 1.5\n", "jam_fraction")]
#[case::jam_fraction_zero("[feed]\njam_fraction = 0.0\n", "jam_fraction")]
#[case::debounce_above_timeout(
    "[feed]\ndebounce_ms = 5000\nrun_timeout_ms = 3000\n",
    "debounce_ms"
)]
#[case::zero_ration("[schedule]\ngrams_per_day = 0\n", "grams_per_day")]
fn invalid_values_are_rejected(#[case] toml: &str, #[case] needle: &str) {
    let cfg = Config::from_toml_str(toml).expect("parses");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err:#}").contains(needle),
        "error should mention {needle}: {err:#}"
    );
}

#[test]
fn unknown_gain_string_fails_to_parse() {
    let err = Config::from_toml_str("[sensor]\nadc_gain_reservoir = \"a256\"\n")
        .expect_err("unknown gain variant");
    assert!(format!("{err:#}").contains("a256") || format!("{err:#}").contains("unknown variant"));
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[schedule]\ngrams_per_day = 80").expect("write");
    let cfg = Config::load(file.path()).expect("load");
    cfg.validate().expect("valid");
    assert_eq!(cfg.schedule.grams_per_day, 80);
}

#[test]
fn missing_file_reports_path() {
    let err = Config::load("/definitely/not/here.toml").expect_err("missing");
    assert!(format!("{err:#}").contains("not/here.toml"));
}
