// Configuration and watermark spec parsing tests

use batchmark::config::{Config, ConfigError};
use batchmark::logging::LogFormat;
use batchmark::watermark::{parse_color, Color, PositionTag, Positions, SpecError, WatermarkSpec};
use rstest::rstest;
use std::io::Write;
use std::str::FromStr;

#[test]
fn test_can_load_config_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
watermark:
  text: "Proof"
  positions: [top-left, bottom-right]
  opacity: 0.5
  color: "rgba(0, 0, 0, 0.5)"
fonts:
  discover_system: false
pipeline:
  output_prefix: "wm-"
logging:
  format: pretty
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).expect("Failed to load config");
    assert_eq!(config.watermark.text, "Proof");
    assert_eq!(
        config.watermark.positions.iter().collect::<Vec<_>>(),
        vec![PositionTag::TopLeft, PositionTag::BottomRight]
    );
    assert_eq!(config.watermark.color.a, 128);
    assert!(!config.fonts.discover_system);
    assert_eq!(config.pipeline.output_name("x.jpg"), "wm-x.jpg");
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_survives_serialization() {
    let mut config = Config::default();
    config.watermark.text = "Round".to_string();
    config.watermark.positions = Positions::new([PositionTag::Tile, PositionTag::Center]).unwrap();
    config.watermark.color = Color::with_alpha(10, 20, 30, 40);

    let yaml = serde_yaml::to_string(&config).unwrap();
    let parsed = Config::from_yaml_with_env(&yaml).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_invalid_section_is_reported_as_invalid() {
    let config = Config::from_yaml_with_env("pipeline:\n  output_prefix: \"a/b\"\n").unwrap();
    match config.validate() {
        Err(ConfigError::Invalid(message)) => assert!(message.contains("output_prefix")),
        other => panic!("expected Invalid, got {:?}", other),
    }
}

#[test]
fn test_repeated_positions_collapse() {
    let config =
        Config::from_yaml_with_env("watermark:\n  positions: [tile, center, tile]\n").unwrap();
    assert_eq!(
        config.watermark.positions.iter().collect::<Vec<_>>(),
        vec![PositionTag::Tile, PositionTag::Center]
    );
}

#[test]
fn test_empty_position_list_is_rejected() {
    let err = Config::from_yaml_with_env("watermark:\n  positions: []\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[rstest]
#[case("tile", PositionTag::Tile)]
#[case("top-bottom", PositionTag::TopBottom)]
#[case("top-left", PositionTag::TopLeft)]
#[case("top-right", PositionTag::TopRight)]
#[case("bottom-left", PositionTag::BottomLeft)]
#[case("bottom-right", PositionTag::BottomRight)]
#[case(" Center ", PositionTag::Center)]
fn test_position_tags_parse(#[case] input: &str, #[case] expected: PositionTag) {
    assert_eq!(PositionTag::from_str(input).unwrap(), expected);
}

#[test]
fn test_unknown_position_tag() {
    assert!(matches!(
        PositionTag::from_str("middle"),
        Err(SpecError::UnknownPosition(_))
    ));
}

#[rstest]
#[case("#fff", Color::new(255, 255, 255))]
#[case("#336699", Color::new(0x33, 0x66, 0x99))]
#[case("#33669980", Color::with_alpha(0x33, 0x66, 0x99, 0x80))]
#[case("rgb(1, 2, 3)", Color::new(1, 2, 3))]
#[case(" RGBA(255, 0, 0, 1) ", Color::new(255, 0, 0))]
fn test_colors_parse(#[case] input: &str, #[case] expected: Color) {
    assert_eq!(parse_color(input).unwrap(), expected);
}

#[rstest]
#[case("")]
#[case("#12")]
#[case("rgb(1, 2)")]
#[case("red")]
#[case("rgba(0, 0, 0, 2)")]
fn test_bad_colors_are_rejected(#[case] input: &str) {
    assert!(matches!(
        parse_color(input),
        Err(SpecError::InvalidColor { .. })
    ));
}

#[test]
fn test_spec_validation_limits() {
    let mut spec = WatermarkSpec::with_text("x");
    assert!(spec.validate().is_ok());

    spec.font_size = 0.0;
    assert!(matches!(spec.validate(), Err(SpecError::InvalidFontSize(_))));

    let mut spec = WatermarkSpec::with_text("x");
    spec.rotation_degrees = 270.0;
    assert!(matches!(spec.validate(), Err(SpecError::InvalidRotation(_))));

    let mut spec = WatermarkSpec::with_text("x");
    spec.font_family = "  ".to_string();
    assert!(matches!(spec.validate(), Err(SpecError::EmptyFontFamily)));
}

#[test]
fn test_effective_alpha_combines_opacity_and_color_alpha() {
    let mut spec = WatermarkSpec::with_text("x");
    spec.opacity = 0.5;
    spec.color = Color::with_alpha(0, 0, 0, 255);
    assert!((spec.effective_alpha() - 0.5).abs() < 1e-6);

    spec.color = Color::with_alpha(0, 0, 0, 0);
    assert_eq!(spec.effective_alpha(), 0.0);
}
