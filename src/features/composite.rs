//! Parsing of composite "systolic/diastolic" blood pressure values.

use crate::error::VitalsError;
use crate::features::CanonicalFeature;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloodPressure {
    pub systolic: f64,
    pub diastolic: f64,
}

fn parse_half(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn halves(raw: &str) -> Option<(&str, &str)> {
    let (sys, dia) = raw.split_once('/')?;
    if dia.contains('/') {
        return None;
    }
    Some((sys, dia))
}

/// Strict split used when writing the snapshot: both halves must be numeric
/// or the whole reading is rejected for the feature columns.
pub fn parse_blood_pressure(raw: &str) -> Result<BloodPressure, VitalsError> {
    let (sys, dia) = halves(raw)
        .ok_or_else(|| VitalsError::parse(raw, "expected '<systolic>/<diastolic>'"))?;
    let systolic =
        parse_half(sys).ok_or_else(|| VitalsError::parse(raw, "systolic half is not numeric"))?;
    let diastolic =
        parse_half(dia).ok_or_else(|| VitalsError::parse(raw, "diastolic half is not numeric"))?;
    Ok(BloodPressure { systolic, diastolic })
}

/// Lenient split used when building model input; each half that fails falls
/// back to its neutral default.
pub fn parse_blood_pressure_lenient(raw: &str) -> BloodPressure {
    let (sys, dia) = halves(raw).unwrap_or((raw, ""));
    BloodPressure {
        systolic: parse_half(sys)
            .unwrap_or_else(|| CanonicalFeature::BpSystolic.neutral_default()),
        diastolic: parse_half(dia)
            .unwrap_or_else(|| CanonicalFeature::BpDiastolic.neutral_default()),
    }
}

/// Halves of a composite value that parsed, each on its own.
pub fn parse_blood_pressure_partial(raw: &str) -> (Option<f64>, Option<f64>) {
    match halves(raw) {
        Some((sys, dia)) => (parse_half(sys), parse_half(dia)),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_well_formed_value() {
        let bp = parse_blood_pressure("120/80").unwrap();
        assert_eq!(bp.systolic, 120.0);
        assert_eq!(bp.diastolic, 80.0);

        let bp = parse_blood_pressure(" 118 / 76 ").unwrap();
        assert_eq!((bp.systolic, bp.diastolic), (118.0, 76.0));
    }

    #[test]
    fn strict_split_rejects_non_numeric_halves() {
        assert!(matches!(
            parse_blood_pressure("abc/80"),
            Err(VitalsError::Parse { .. })
        ));
        assert!(parse_blood_pressure("120/").is_err());
        assert!(parse_blood_pressure("120").is_err());
        assert!(parse_blood_pressure("120/80/60").is_err());
        assert!(parse_blood_pressure("NaN/80").is_err());
    }

    #[test]
    fn lenient_split_defaults_each_bad_half() {
        let bp = parse_blood_pressure_lenient("abc/85");
        assert_eq!((bp.systolic, bp.diastolic), (120.0, 85.0));

        let bp = parse_blood_pressure_lenient("135/??");
        assert_eq!((bp.systolic, bp.diastolic), (135.0, 80.0));

        let bp = parse_blood_pressure_lenient("garbage");
        assert_eq!((bp.systolic, bp.diastolic), (120.0, 80.0));
    }

    #[test]
    fn partial_split_keeps_good_half_only() {
        assert_eq!(parse_blood_pressure_partial("abc/80"), (None, Some(80.0)));
        assert_eq!(parse_blood_pressure_partial("nope"), (None, None));
    }
}
