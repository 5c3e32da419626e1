//! This bench filters a large measurement history by department, probe
//! location and date range, then builds the charted workbook from the result.

#![allow(missing_docs)]

use chrono::{Days, NaiveDate};
use criterion::{Criterion, criterion_group, criterion_main};
use maintlog::{
    DateRange, Equipment, EquipmentCode, HistoryFilter, Measurement, MeasurementPoint,
    export::export_measurements,
};

/// Generates 40 pieces of equipment across 8 departments, each with two
/// years of weekly readings at every probe location.
fn preseed_history() -> (Vec<Equipment>, Vec<Measurement>) {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut roster = Vec::new();
    let mut measurements = Vec::new();
    for i in 0..40 {
        let code = EquipmentCode::new(format!("{}-{}P", 100 + i, i % 7)).unwrap();
        roster.push(Equipment::new(code.clone(), format!("DEPT {}", i % 8)));
        for week in 0..104u64 {
            let date = start + Days::new(week * 7);
            for point in MeasurementPoint::ALL {
                measurements.push(Measurement {
                    equipment: code.clone(),
                    point,
                    date,
                    speed_rpm: 1480.0,
                    twf_rms_g: 0.1 + f64::from(u32::try_from(week).unwrap()) / 1000.0,
                    crest_factor: 3.2,
                    twf_peak_to_peak_g: 1.05,
                });
            }
        }
    }
    (roster, measurements)
}

fn filter_history(c: &mut Criterion) {
    let (roster, measurements) = preseed_history();
    let filter = HistoryFilter::new()
        .departments(["DEPT 1", "DEPT 5"])
        .points([MeasurementPoint::MotorDriveEnd, MeasurementPoint::GearboxInput])
        .dates(DateRange::new(
            NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        ));

    c.bench_function("filter history", |b| {
        b.iter(|| filter.apply(&measurements, &roster));
    });

    let selected = filter.apply(&measurements, &roster);
    c.bench_function("export measurements", |b| {
        b.iter(|| export_measurements(selected.iter().copied(), &roster).unwrap());
    });
}

criterion_group!(benches, filter_history);
criterion_main!(benches);
