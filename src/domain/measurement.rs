use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{EquipmentCode, MeasurementPoint, Metric};

/// Rounds a reading to the two decimal places kept by the stores.
///
/// Halves are rounded away from zero.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A vibration and speed reading ("suivi") for one probe location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// The equipment this reading refers to.
    pub equipment: EquipmentCode,
    /// Where the probe was placed.
    pub point: MeasurementPoint,
    /// Calendar date of the reading.
    pub date: NaiveDate,
    /// Rotational speed in RPM.
    pub speed_rpm: f64,
    /// Time-waveform RMS acceleration in g.
    pub twf_rms_g: f64,
    /// Crest factor.
    pub crest_factor: f64,
    /// Time-waveform peak-to-peak acceleration in g.
    pub twf_peak_to_peak_g: f64,
}

impl Measurement {
    /// Returns a copy with every reading rounded to two decimal places.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            speed_rpm: round2(self.speed_rpm),
            twf_rms_g: round2(self.twf_rms_g),
            crest_factor: round2(self.crest_factor),
            twf_peak_to_peak_g: round2(self.twf_peak_to_peak_g),
            ..self.clone()
        }
    }

    /// The value of one metric.
    #[must_use]
    pub const fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Speed => self.speed_rpm,
            Metric::TwfRms => self.twf_rms_g,
            Metric::CrestFactor => self.crest_factor,
            Metric::TwfPeakToPeak => self.twf_peak_to_peak_g,
        }
    }

    /// Returns `true` if this reading is identified by the given triple.
    #[must_use]
    pub fn is_keyed_by(
        &self,
        equipment: &EquipmentCode,
        point: MeasurementPoint,
        date: NaiveDate,
    ) -> bool {
        &self.equipment == equipment && self.point == point && self.date == date
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(1234.5678, 1234.57)]
    #[test_case(0.125, 0.13 ; "half rounds away from zero")]
    #[test_case(-2.345_001, -2.35)]
    #[test_case(3.0, 3.0)]
    fn rounds_to_two_decimals(input: f64, expected: f64) {
        assert!((round2(input) - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn rounded_touches_every_reading() {
        let measurement = Measurement {
            equipment: EquipmentCode::new("EQ1").unwrap(),
            point: MeasurementPoint::MotorDriveEnd,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            speed_rpm: 1480.004,
            twf_rms_g: 0.456,
            crest_factor: 3.333,
            twf_peak_to_peak_g: 2.999,
        }
        .rounded();

        assert!((measurement.speed_rpm - 1480.0).abs() < f64::EPSILON);
        assert!((measurement.twf_rms_g - 0.46).abs() < f64::EPSILON);
        assert!((measurement.crest_factor - 3.33).abs() < f64::EPSILON);
        assert!((measurement.twf_peak_to_peak_g - 3.0).abs() < f64::EPSILON);
    }
}
