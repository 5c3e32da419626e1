//! A hosted relational store reached through its PostgREST interface.

use chrono::NaiveDate;
use reqwest::{
    blocking::{Client, RequestBuilder, Response},
    header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    domain::{
        Equipment, EquipmentCode, HostedCredentials, Importance, Measurement, MeasurementPoint,
        Observation, round2,
        schema::{self, COL_DATE, COL_EQUIPMENT, COL_POINT},
    },
    storage::{
        Backend, CascadeCounts, StorageError,
        rows::{RowError, collect_valid, format_date, parse_date},
    },
};

/// Table holding the equipment roster.
pub const EQUIPMENT_TABLE: &str = "equipements";
/// Table holding observations.
pub const OBSERVATIONS_TABLE: &str = "observations";
/// Table holding measurements.
pub const MEASUREMENTS_TABLE: &str = "suivi_equipements";

/// Rows requested per page when reading a table.
const PAGE_SIZE: usize = 1000;

/// Key columns each table is paged by.
const EQUIPMENT_ORDER: &str = "id_equipement";
const OBSERVATIONS_ORDER: &str = "id_equipement,date";
const MEASUREMENTS_ORDER: &str = "id_equipement,point_mesure,date";

/// A storage backend talking to a hosted database over REST.
///
/// Deleting equipment relies on the database cascading the delete to the
/// two history tables.
#[derive(Debug)]
pub struct HostedBackend {
    client: Client,
    base_url: String,
}

impl HostedBackend {
    /// Builds a client for the given service.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidAccessKey`] if the key cannot be sent as
    /// a header, or [`StorageError::Transport`] if the HTTP client cannot be
    /// built.
    pub fn new(credentials: &HostedCredentials) -> Result<Self, StorageError> {
        let client = Client::builder()
            .default_headers(auth_headers(&credentials.access_key)?)
            .build()?;
        Ok(Self {
            client,
            base_url: credentials.service_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        table_url(&self.base_url, table)
    }

    /// Reads every row of `table`, one page at a time.
    ///
    /// Stops on the first empty page, so a server-side cap on rows per
    /// response below `PAGE_SIZE` still yields the whole table.
    fn select<R: DeserializeOwned>(&self, table: &str, order: &str) -> Result<Vec<R>, StorageError> {
        let mut rows = Vec::new();
        loop {
            let query = page_query(order, rows.len());
            tracing::debug!("GET {table} {query:?}");
            let response = self.client.get(self.table_url(table)).query(&query).send()?;
            let page: Vec<R> = check(response, &format!("select from {table}"))?.json()?;
            if page.is_empty() {
                break;
            }
            rows.extend(page);
        }
        Ok(rows)
    }

    fn insert<R: Serialize + ?Sized>(&self, table: &str, rows: &R) -> Result<(), StorageError> {
        tracing::debug!("POST {table}");
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(rows);
        check(request.send()?, &format!("insert into {table}"))?;
        Ok(())
    }

    fn delete(&self, table: &str, filters: &[(&str, String)]) -> Result<usize, StorageError> {
        let query = eq_filters(filters);
        tracing::debug!("DELETE {table} {query:?}");
        let request: RequestBuilder = self
            .client
            .delete(self.table_url(table))
            .header("Prefer", "return=representation")
            .query(&query);
        let response = check(request.send()?, &format!("delete from {table}"))?;
        let deleted: Vec<serde_json::Value> = response.json()?;
        Ok(deleted.len())
    }

    /// Counts the rows of `table` referring to `equipment` without fetching them.
    fn count(&self, table: &str, equipment: &EquipmentCode) -> Result<usize, StorageError> {
        let query = eq_filters(&[(COL_EQUIPMENT, equipment.to_string())]);
        tracing::debug!("HEAD {table} {query:?}");
        let request = self
            .client
            .head(self.table_url(table))
            .header("Prefer", "count=exact")
            .query(&query);
        let response = check(request.send()?, &format!("count {table}"))?;
        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(content_range_total)
            .ok_or_else(|| StorageError::MissingCount {
                table: table.to_string(),
            })
    }
}

fn auth_headers(access_key: &str) -> Result<HeaderMap, StorageError> {
    let value = |raw: String| {
        let mut value = HeaderValue::from_str(&raw).map_err(|_| StorageError::InvalidAccessKey)?;
        value.set_sensitive(true);
        Ok::<_, StorageError>(value)
    };
    let mut headers = HeaderMap::new();
    headers.insert("apikey", value(access_key.to_string())?);
    headers.insert(AUTHORIZATION, value(format!("Bearer {access_key}"))?);
    Ok(headers)
}

fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{table}", base_url.trim_end_matches('/'))
}

/// Equality filters in PostgREST query syntax.
fn eq_filters(filters: &[(&str, String)]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|(column, value)| ((*column).to_string(), format!("eq.{value}")))
        .collect()
}

/// Query for the page of rows starting at `offset`, in key order.
fn page_query(order: &str, offset: usize) -> Vec<(String, String)> {
    vec![
        ("select".to_string(), "*".to_string()),
        ("order".to_string(), order.to_string()),
        ("offset".to_string(), offset.to_string()),
        ("limit".to_string(), PAGE_SIZE.to_string()),
    ]
}

/// The total from a `Content-Range` value such as `0-24/25` or `*/0`.
fn content_range_total(value: &str) -> Option<usize> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.parse().ok()
}

fn check(response: Response, operation: &str) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(StorageError::Rejected {
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    })
}

impl Backend for HostedBackend {
    fn initialise(&mut self) -> Result<(), StorageError> {
        if self.load_equipment()?.is_empty() {
            let seed: Vec<EquipmentRecord> = schema::SEED_ROSTER
                .iter()
                .map(|(code, department)| EquipmentRecord {
                    equipment: (*code).to_string(),
                    department: (*department).to_string(),
                })
                .collect();
            self.insert(EQUIPMENT_TABLE, &seed)?;
            tracing::info!("seeded hosted roster with {} example equipment", seed.len());
        }
        Ok(())
    }

    fn load_equipment(&self) -> Result<Vec<Equipment>, StorageError> {
        let rows: Vec<EquipmentRecord> = self.select(EQUIPMENT_TABLE, EQUIPMENT_ORDER)?;
        Ok(collect_valid("equipment", rows))
    }

    fn load_observations(&self) -> Result<Vec<Observation>, StorageError> {
        let rows: Vec<ObservationRecord> = self.select(OBSERVATIONS_TABLE, OBSERVATIONS_ORDER)?;
        Ok(collect_valid("observation", rows))
    }

    fn load_measurements(&self) -> Result<Vec<Measurement>, StorageError> {
        let rows: Vec<MeasurementRecord> = self.select(MEASUREMENTS_TABLE, MEASUREMENTS_ORDER)?;
        Ok(collect_valid("measurement", rows))
    }

    fn insert_equipment(&mut self, equipment: &Equipment) -> Result<(), StorageError> {
        self.insert(EQUIPMENT_TABLE, &EquipmentRecord::from(equipment))
    }

    fn append_observation(&mut self, observation: &Observation) -> Result<(), StorageError> {
        self.insert(OBSERVATIONS_TABLE, &ObservationRecord::from(observation))
    }

    fn append_measurement(&mut self, measurement: &Measurement) -> Result<(), StorageError> {
        self.insert(
            MEASUREMENTS_TABLE,
            &MeasurementRecord::from(&measurement.rounded()),
        )
    }

    fn delete_observations(
        &mut self,
        equipment: &EquipmentCode,
        date: NaiveDate,
    ) -> Result<usize, StorageError> {
        self.delete(
            OBSERVATIONS_TABLE,
            &[
                (COL_EQUIPMENT, equipment.to_string()),
                (COL_DATE, format_date(date)),
            ],
        )
    }

    fn delete_measurements(
        &mut self,
        equipment: &EquipmentCode,
        point: MeasurementPoint,
        date: NaiveDate,
    ) -> Result<usize, StorageError> {
        self.delete(
            MEASUREMENTS_TABLE,
            &[
                (COL_EQUIPMENT, equipment.to_string()),
                (COL_POINT, point.label().to_string()),
                (COL_DATE, format_date(date)),
            ],
        )
    }

    fn delete_equipment(&mut self, equipment: &EquipmentCode) -> Result<CascadeCounts, StorageError> {
        let counts = CascadeCounts {
            observations: self.count(OBSERVATIONS_TABLE, equipment)?,
            measurements: self.count(MEASUREMENTS_TABLE, equipment)?,
        };
        self.delete(EQUIPMENT_TABLE, &[(COL_EQUIPMENT, equipment.to_string())])?;
        Ok(counts)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EquipmentRecord {
    #[serde(rename = "id_equipement")]
    equipment: String,
    #[serde(rename = "departement", default)]
    department: String,
}

impl From<&Equipment> for EquipmentRecord {
    fn from(equipment: &Equipment) -> Self {
        Self {
            equipment: equipment.code.to_string(),
            department: equipment.department.clone(),
        }
    }
}

impl TryFrom<EquipmentRecord> for Equipment {
    type Error = RowError;

    fn try_from(record: EquipmentRecord) -> Result<Self, Self::Error> {
        Ok(Self::new(EquipmentCode::new(record.equipment)?, record.department))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ObservationRecord {
    #[serde(rename = "id_equipement")]
    equipment: String,
    date: String,
    #[serde(default)]
    observation: Option<String>,
    #[serde(rename = "recommandation", default)]
    recommendation: Option<String>,
    #[serde(rename = "travaux_notes", default)]
    work_notes: Option<String>,
    #[serde(rename = "analyste", default)]
    analyst: Option<String>,
    #[serde(default)]
    importance: Option<String>,
}

impl From<&Observation> for ObservationRecord {
    fn from(observation: &Observation) -> Self {
        Self {
            equipment: observation.equipment.to_string(),
            date: format_date(observation.date),
            observation: Some(observation.observation.clone()),
            recommendation: Some(observation.recommendation.clone()),
            work_notes: Some(observation.work_notes.clone()),
            analyst: Some(observation.analyst.clone()),
            importance: observation.importance.map(|level| level.label().to_string()),
        }
    }
}

impl TryFrom<ObservationRecord> for Observation {
    type Error = RowError;

    fn try_from(record: ObservationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            equipment: EquipmentCode::new(record.equipment)?,
            date: parse_date(&record.date)?,
            observation: record.observation.unwrap_or_default(),
            recommendation: record.recommendation.unwrap_or_default(),
            work_notes: record.work_notes.unwrap_or_default(),
            analyst: record.analyst.unwrap_or_default(),
            importance: Importance::parse_optional(record.importance.as_deref().unwrap_or_default())?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MeasurementRecord {
    #[serde(rename = "id_equipement")]
    equipment: String,
    #[serde(rename = "point_mesure")]
    point: String,
    date: String,
    #[serde(rename = "vitesse_rpm")]
    speed_rpm: Option<f64>,
    twf_rms_g: Option<f64>,
    crest_factor: Option<f64>,
    twf_peak_to_peak_g: Option<f64>,
}

impl From<&Measurement> for MeasurementRecord {
    fn from(measurement: &Measurement) -> Self {
        Self {
            equipment: measurement.equipment.to_string(),
            point: measurement.point.label().to_string(),
            date: format_date(measurement.date),
            speed_rpm: Some(measurement.speed_rpm),
            twf_rms_g: Some(measurement.twf_rms_g),
            crest_factor: Some(measurement.crest_factor),
            twf_peak_to_peak_g: Some(measurement.twf_peak_to_peak_g),
        }
    }
}

fn reading(column: &'static str, value: Option<f64>) -> Result<f64, RowError> {
    value
        .filter(|number| number.is_finite())
        .map(round2)
        .ok_or_else(|| RowError::Number {
            column,
            value: value.map_or_else(|| "null".to_string(), |v| v.to_string()),
        })
}

impl TryFrom<MeasurementRecord> for Measurement {
    type Error = RowError;

    fn try_from(record: MeasurementRecord) -> Result<Self, Self::Error> {
        use crate::domain::schema::{COL_CREST_FACTOR, COL_SPEED, COL_TWF_PEAK_TO_PEAK, COL_TWF_RMS};

        Ok(Self {
            equipment: EquipmentCode::new(record.equipment)?,
            point: record.point.parse()?,
            date: parse_date(&record.date)?,
            speed_rpm: reading(COL_SPEED, record.speed_rpm)?,
            twf_rms_g: reading(COL_TWF_RMS, record.twf_rms_g)?,
            crest_factor: reading(COL_CREST_FACTOR, record.crest_factor)?,
            twf_peak_to_peak_g: reading(COL_TWF_PEAK_TO_PEAK, record.twf_peak_to_peak_g)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn credentials(url: &str) -> HostedCredentials {
        HostedCredentials {
            service_url: url.to_string(),
            access_key: "anon-key".to_string(),
        }
    }

    #[test]
    fn table_url_ignores_trailing_slash() {
        assert_eq!(
            table_url("https://example.supabase.co/", OBSERVATIONS_TABLE),
            "https://example.supabase.co/rest/v1/observations"
        );
    }

    #[test]
    fn filters_use_equality_operator() {
        let filters = eq_filters(&[
            (COL_EQUIPMENT, "244-3P-1".to_string()),
            (COL_POINT, MeasurementPoint::GearboxInput.label().to_string()),
        ]);
        assert_eq!(
            filters,
            vec![
                ("id_equipement".to_string(), "eq.244-3P-1".to_string()),
                ("point_mesure".to_string(), "eq.Réducteur - entrée".to_string()),
            ]
        );
    }

    #[test]
    fn pages_are_ordered_by_key_and_bounded() {
        let query = page_query(MEASUREMENTS_ORDER, 2000);
        assert_eq!(
            query,
            vec![
                ("select".to_string(), "*".to_string()),
                ("order".to_string(), "id_equipement,point_mesure,date".to_string()),
                ("offset".to_string(), "2000".to_string()),
                ("limit".to_string(), "1000".to_string()),
            ]
        );
    }

    #[test_case("0-24/25" => Some(25); "partial range")]
    #[test_case("*/0" => Some(0); "no rows")]
    #[test_case(" */1500 " => Some(1500); "padded")]
    #[test_case("0-24/*" => None; "unknown total")]
    #[test_case("garbage" => None; "no separator")]
    fn row_count_comes_from_content_range(value: &str) -> Option<usize> {
        content_range_total(value)
    }

    #[test]
    fn auth_headers_carry_key_twice() {
        let headers = auth_headers("anon-key").unwrap();
        assert_eq!(headers["apikey"], "anon-key");
        assert_eq!(headers[AUTHORIZATION], "Bearer anon-key");
        assert!(headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn key_with_newline_is_rejected() {
        let error = HostedBackend::new(&HostedCredentials {
            access_key: "bad\nkey".to_string(),
            ..credentials("https://example.supabase.co")
        })
        .unwrap_err();
        assert!(matches!(error, StorageError::InvalidAccessKey));
    }

    #[test]
    fn hosted_notes_column_maps_to_work_notes() {
        let record: ObservationRecord = serde_json::from_value(serde_json::json!({
            "id": 17,
            "id_equipement": "EQ1",
            "date": "2024-01-10",
            "observation": "leak",
            "recommandation": null,
            "travaux_notes": "tightened bolt",
            "analyste": "J.Doe",
            "importance": "Élevée"
        }))
        .unwrap();

        let observation = Observation::try_from(record).unwrap();

        assert_eq!(observation.work_notes, "tightened bolt");
        assert_eq!(observation.recommendation, "");
        assert_eq!(observation.importance, Some(Importance::High));
    }

    #[test]
    fn observation_serializes_with_hosted_columns() {
        let observation = Observation {
            equipment: EquipmentCode::new("EQ1").unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            observation: "leak".to_string(),
            recommendation: "replace seal".to_string(),
            work_notes: "none".to_string(),
            analyst: "J.Doe".to_string(),
            importance: None,
        };

        let json = serde_json::to_value(ObservationRecord::from(&observation)).unwrap();

        assert_eq!(json["travaux_notes"], "none");
        assert_eq!(json["date"], "2024-01-10");
        assert!(json["importance"].is_null());
    }

    #[test]
    fn null_reading_rejects_the_row() {
        let record: MeasurementRecord = serde_json::from_value(serde_json::json!({
            "id_equipement": "EQ1",
            "point_mesure": "Moteur - côté accouplement",
            "date": "2024-01-10",
            "vitesse_rpm": null,
            "twf_rms_g": 0.1,
            "crest_factor": 3.0,
            "twf_peak_to_peak_g": 1.0
        }))
        .unwrap();

        let error = Measurement::try_from(record).unwrap_err();

        assert_eq!(error.to_string(), "column vitesse_rpm holds 'null', expected a number");
    }

    #[test]
    fn unreachable_service_is_a_transport_error() {
        let backend = HostedBackend::new(&credentials("http://127.0.0.1:9")).unwrap();

        let error = backend.load_equipment().unwrap_err();

        assert!(matches!(error, StorageError::Transport(_)));
    }
}
