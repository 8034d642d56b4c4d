//! Weather-condition file
//!
//! Comma separated, one condition per line. Accepted layouts:
//! - 11 fields: name, nine scalars, headlight flag
//! - 10 fields: name, nine scalars (headlights off)
//! - 6 fields (legacy): cloudiness, precipitation, precipitation_deposits,
//!   wind_intensity, sun_azimuth_angle, sun_altitude_angle
//!
//! The whole file is validated eagerly. One bad line rejects every condition.

use contracts::{ContractError, WeatherCondition, WeatherParams};
use validator::Validate;

const LEGACY_FIELDS: [&str; 6] = [
    "cloudiness",
    "precipitation",
    "precipitation_deposits",
    "wind_intensity",
    "sun_azimuth_angle",
    "sun_altitude_angle",
];

/// Parse and validate every condition, preserving file order and duplicates
pub fn parse_conditions(
    content: &str,
    source: &str,
) -> Result<Vec<WeatherCondition>, ContractError> {
    let mut conditions = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let location = format!("{source}:{}", idx + 1);
        let condition = parse_line(line, &location)?;
        validate_condition(&condition, &location)?;
        conditions.push(condition);
    }

    Ok(conditions)
}

fn parse_line(line: &str, location: &str) -> Result<WeatherCondition, ContractError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();

    match fields.len() {
        10 | 11 => {
            let name = fields[0].to_string();
            let mut scalars = [0.0; 9];
            for (i, field) in WeatherParams::FIELD_NAMES.iter().enumerate() {
                scalars[i] = number(location, field, fields[i + 1])?;
            }
            let headlights_on = match fields.get(10) {
                Some(flag) => number(location, "headlights", flag)? != 0.0,
                None => false,
            };
            Ok(WeatherCondition {
                name,
                params: WeatherParams::from_scalars(scalars),
                headlights_on,
            })
        }
        6 => {
            let mut values = [0.0; 6];
            for (i, field) in LEGACY_FIELDS.iter().enumerate() {
                values[i] = number(location, field, fields[i])?;
            }
            let name = values
                .iter()
                .map(|v| (v.trunc() as i64).to_string())
                .collect::<Vec<_>>()
                .join("_");
            let params = WeatherParams {
                cloudiness: values[0],
                precipitation: values[1],
                precipitation_deposits: values[2],
                wind_intensity: values[3],
                sun_azimuth_angle: values[4],
                sun_altitude_angle: values[5],
                ..WeatherParams::default()
            };
            Ok(WeatherCondition {
                name,
                params,
                headlights_on: false,
            })
        }
        n => Err(ContractError::config_parse(format!(
            "{location}: expected 6, 10 or 11 comma-separated fields, got {n}"
        ))),
    }
}

fn number(location: &str, field: &str, token: &str) -> Result<f64, ContractError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            ContractError::config_parse(format!(
                "{location}: {field} must be a finite number, got '{token}'"
            ))
        })
}

fn validate_condition(condition: &WeatherCondition, location: &str) -> Result<(), ContractError> {
    if condition.name.is_empty() {
        return Err(ContractError::config_validation(
            format!("{location}.name"),
            "condition name must not be empty",
        ));
    }

    if let Err(errors) = condition.params.validate() {
        let field_errors = errors.field_errors();
        let field = WeatherParams::FIELD_NAMES
            .iter()
            .find(|name| field_errors.contains_key(**name))
            .copied()
            .unwrap_or("params");
        return Err(ContractError::config_validation(
            format!("{location}.{field}"),
            format!(
                "condition '{}' out of range: {}",
                condition.name,
                describe(&condition.params, field)
            ),
        ));
    }
    Ok(())
}

fn describe(params: &WeatherParams, field: &str) -> String {
    let (value, range) = match field {
        "cloudiness" => (params.cloudiness, "[0, 100]"),
        "precipitation" => (params.precipitation, "[0, 100]"),
        "precipitation_deposits" => (params.precipitation_deposits, "[0, 100]"),
        "wind_intensity" => (params.wind_intensity, "[0, 100]"),
        "fog_density" => (params.fog_density, "[0, 100]"),
        "fog_distance" => (params.fog_distance, ">= 0"),
        "wetness" => (params.wetness, "[0, 100]"),
        "sun_azimuth_angle" => (params.sun_azimuth_angle, "[0, 360]"),
        "sun_altitude_angle" => (params.sun_altitude_angle, "[-90, 90]"),
        _ => return "invalid parameters".to_string(),
    };
    format!("{field} = {value}, expected {range}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_layout_in_order() {
        let content = "\
# name,cloud,rain,puddles,wind,fog,fogdist,wet,azimuth,altitude,lights
ClearNoon,10,0,0,5,0,0,0,180,45,0
NightRain,80,60,40,30,10,50,70,90,-30,1
ClearNoon,10,0,0,5,0,0,0,180,45,0
";
        let conditions = parse_conditions(content, "weather.csv").unwrap();
        assert_eq!(conditions.len(), 3);
        assert_eq!(conditions[0].name, "ClearNoon");
        assert!(!conditions[0].headlights_on);
        assert_eq!(conditions[1].name, "NightRain");
        assert!(conditions[1].headlights_on);
        assert_eq!(conditions[1].params.sun_altitude_angle, -30.0);
        assert_eq!(conditions[2], conditions[0]);
    }

    #[test]
    fn ten_fields_means_headlights_off() {
        let conditions =
            parse_conditions("Foggy,0,0,0,0,60,10,0,0,20\n", "weather.csv").unwrap();
        assert!(!conditions[0].headlights_on);
        assert_eq!(conditions[0].params.fog_density, 60.0);
    }

    #[test]
    fn legacy_layout_synthesises_name() {
        let conditions = parse_conditions("10,0,0,5,180,45\n", "weather.csv").unwrap();
        let c = &conditions[0];
        assert_eq!(c.name, "10_0_0_5_180_45");
        assert_eq!(c.params.sun_azimuth_angle, 180.0);
        assert_eq!(c.params.fog_density, 0.0);
        assert_eq!(c.params.wetness, 0.0);
    }

    #[test]
    fn out_of_range_line_rejects_whole_file() {
        let content = "ClearNoon,10,0,0,5,0,0,0,180,45,0\nRainy,50,120,50,10,0,0,0,180,45,0\n";
        let err = parse_conditions(content, "weather.csv").unwrap_err();
        match err {
            ContractError::ConfigValidation { field, message } => {
                assert_eq!(field, "weather.csv:2.precipitation");
                assert!(message.contains("Rainy"), "got: {message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn wrong_field_count() {
        let err = parse_conditions("Clear,1,2,3\n", "weather.csv").unwrap_err();
        assert!(err.to_string().contains("weather.csv:1"));
    }

    #[test]
    fn non_finite_scalar_rejected() {
        assert!(parse_conditions("Clear,inf,0,0,0,0,0,0,0,0,0\n", "w.csv").is_err());
        assert!(parse_conditions("Clear,abc,0,0,0,0,0,0,0,0,0\n", "w.csv").is_err());
    }

    #[test]
    fn empty_name_rejected() {
        assert!(parse_conditions(",10,0,0,5,0,0,0,180,45,0\n", "w.csv").is_err());
    }
}
