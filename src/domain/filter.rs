//! Filter composition over in-memory history.
//!
//! Each dimension is independent and the dimensions are combined with a
//! logical AND. An empty selection on a dimension places no restriction on
//! it.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;

use crate::domain::{Equipment, EquipmentCode, MeasurementPoint, Measurement, Observation};

/// A record belonging to the history of one equipment.
pub trait HistoryRecord {
    /// The equipment the record refers to.
    fn equipment(&self) -> &EquipmentCode;

    /// The calendar date of the record.
    fn date(&self) -> NaiveDate;

    /// The probe location, for records that have one.
    fn point(&self) -> Option<MeasurementPoint> {
        None
    }
}

impl HistoryRecord for Observation {
    fn equipment(&self) -> &EquipmentCode {
        &self.equipment
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl HistoryRecord for Measurement {
    fn equipment(&self) -> &EquipmentCode {
        &self.equipment
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn point(&self) -> Option<MeasurementPoint> {
        Some(self.point)
    }
}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Creates a range, swapping the bounds if they are given in reverse.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// The smallest range covering every record, or `None` if there are none.
    pub fn spanning<'a, T, I>(records: I) -> Option<Self>
    where
        T: HistoryRecord + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        records.into_iter().fold(None, |range: Option<Self>, record| {
            let date = record.date();
            Some(range.map_or_else(
                || Self::new(date, date),
                |range| Self::new(range.start.min(date), range.end.max(date)),
            ))
        })
    }

    /// First day of the range.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Returns `true` if `date` lies within the range, bounds included.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A composable filter over observations or measurements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    departments: BTreeSet<String>,
    equipment: BTreeSet<EquipmentCode>,
    points: BTreeSet<MeasurementPoint>,
    dates: Option<DateRange>,
}

impl HistoryFilter {
    /// A filter that keeps everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to equipment of the given departments.
    #[must_use]
    pub fn departments<I, S>(mut self, departments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.departments.extend(departments.into_iter().map(Into::into));
        self
    }

    /// Restricts to the given equipment codes.
    #[must_use]
    pub fn equipment<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = EquipmentCode>,
    {
        self.equipment.extend(codes);
        self
    }

    /// Restricts measurements to the given probe locations.
    ///
    /// Records without a probe location are unaffected.
    #[must_use]
    pub fn points<I>(mut self, points: I) -> Self
    where
        I: IntoIterator<Item = MeasurementPoint>,
    {
        self.points.extend(points);
        self
    }

    /// Restricts to an inclusive date range.
    #[must_use]
    pub const fn dates(mut self, range: DateRange) -> Self {
        self.dates = Some(range);
        self
    }

    /// Returns `true` if no dimension is restricted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
            && self.equipment.is_empty()
            && self.points.is_empty()
            && self.dates.is_none()
    }

    /// Applies the filter, preserving the input order.
    ///
    /// Department membership is derived from `roster`: a record passes the
    /// department dimension only if its equipment is on the roster under one
    /// of the selected departments.
    pub fn apply<'a, T: HistoryRecord>(&self, records: &'a [T], roster: &[Equipment]) -> Vec<&'a T> {
        let in_departments: Option<HashSet<&EquipmentCode>> = (!self.departments.is_empty())
            .then(|| {
                roster
                    .iter()
                    .filter(|equipment| self.departments.contains(&equipment.department))
                    .map(|equipment| &equipment.code)
                    .collect()
            });

        records
            .iter()
            .filter(|record| {
                in_departments
                    .as_ref()
                    .is_none_or(|codes| codes.contains(record.equipment()))
            })
            .filter(|record| self.equipment.is_empty() || self.equipment.contains(record.equipment()))
            .filter(|record| {
                self.points.is_empty()
                    || record.point().is_none_or(|point| self.points.contains(&point))
            })
            .filter(|record| self.dates.is_none_or(|range| range.contains(record.date())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> EquipmentCode {
        EquipmentCode::new(s).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn roster() -> Vec<Equipment> {
        vec![
            Equipment::new(code("X"), "A"),
            Equipment::new(code("Y"), "A"),
            Equipment::new(code("Z"), "B"),
        ]
    }

    fn observation(equipment: &str, day: u32) -> Observation {
        Observation {
            equipment: code(equipment),
            date: date(day),
            observation: format!("obs {equipment} {day}"),
            recommendation: String::new(),
            work_notes: String::new(),
            analyst: "J.Doe".to_string(),
            importance: None,
        }
    }

    fn history() -> Vec<Observation> {
        vec![
            observation("X", 1),
            observation("Y", 5),
            observation("Z", 10),
            observation("X", 20),
            observation("ORPHAN", 15),
        ]
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let history = history();
        let filter = HistoryFilter::new();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&history, &roster()).len(), history.len());
    }

    #[test]
    fn department_filter_uses_roster_membership() {
        let history = history();
        let kept = HistoryFilter::new().departments(["A"]).apply(&history, &roster());
        let codes: Vec<_> = kept.iter().map(|o| o.equipment.as_str()).collect();
        assert_eq!(codes, vec!["X", "Y", "X"]);
    }

    #[test]
    fn redundant_department_filter_matches_equipment_filter_alone() {
        let history = history();
        let roster = roster();
        let both = HistoryFilter::new()
            .departments(["A"])
            .equipment([code("X")])
            .apply(&history, &roster);
        let alone = HistoryFilter::new().equipment([code("X")]).apply(&history, &roster);
        assert_eq!(both, alone);
        assert_eq!(alone.len(), 2);
    }

    #[test]
    fn contradictory_department_filter_matches_nothing() {
        let history = history();
        let kept = HistoryFilter::new()
            .departments(["B"])
            .equipment([code("X")])
            .apply(&history, &roster());
        assert!(kept.is_empty());
    }

    #[test]
    fn date_range_is_inclusive() {
        let history = history();
        let kept = HistoryFilter::new()
            .dates(DateRange::new(date(5), date(15)))
            .apply(&history, &roster());
        let days: Vec<_> = kept.iter().map(|o| o.date).collect();
        assert_eq!(days, vec![date(5), date(10), date(15)]);
    }

    #[test]
    fn reversed_range_is_normalised() {
        let range = DateRange::new(date(20), date(2));
        assert_eq!(range.start(), date(2));
        assert_eq!(range.end(), date(20));
    }

    #[test]
    fn spanning_range_covers_all_records() {
        let history = history();
        let range = DateRange::spanning(&history).unwrap();
        assert_eq!(range, DateRange::new(date(1), date(20)));
        assert!(DateRange::spanning::<Observation, _>(&[]).is_none());
    }

    #[test]
    fn point_filter_applies_to_measurements_only() {
        let reading = |point| Measurement {
            equipment: code("X"),
            point,
            date: date(3),
            speed_rpm: 1500.0,
            twf_rms_g: 0.2,
            crest_factor: 3.1,
            twf_peak_to_peak_g: 1.1,
        };
        let readings = vec![
            reading(MeasurementPoint::MotorDriveEnd),
            reading(MeasurementPoint::GearboxInput),
        ];
        let filter = HistoryFilter::new().points([MeasurementPoint::GearboxInput]);

        let kept = filter.apply(&readings, &roster());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].point, MeasurementPoint::GearboxInput);

        let history = history();
        assert_eq!(filter.apply(&history, &roster()).len(), history.len());
    }
}
