use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDateTime};
use std::fs;
use std::path::Path;
use vacuumcore::prelude::CHANNEL_COUNT;
use vacuumcore::ChannelSeries;

const TIMESTAMP_COLUMN: &str = "timestamp";
const WEIGHT_COLUMNS: [&str; CHANNEL_COUNT] = ["weight_1", "weight_2", "weight_3", "weight_4"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Clone, Copy, PartialEq)]
enum TimeValue {
    Seconds(f64),
    Instant(NaiveDateTime),
}

fn parse_time(raw: &str) -> Option<TimeValue> {
    if let Ok(seconds) = raw.parse::<f64>() {
        return Some(TimeValue::Seconds(seconds));
    }
    for format in DATETIME_FORMATS {
        if let Ok(instant) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(TimeValue::Instant(instant));
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|instant| TimeValue::Instant(instant.naive_utc()))
}

fn clean(field: &str) -> &str {
    field.trim().trim_matches('"').trim()
}

/// Converts the time column to seconds; datetimes become offsets from the first row.
fn to_seconds(times: &[TimeValue]) -> anyhow::Result<Vec<f64>> {
    match times.first() {
        None => Ok(Vec::new()),
        Some(TimeValue::Seconds(_)) => times
            .iter()
            .map(|value| match value {
                TimeValue::Seconds(seconds) => Ok(*seconds),
                TimeValue::Instant(_) => Err(anyhow!("mixed numeric and datetime timestamps")),
            })
            .collect(),
        Some(TimeValue::Instant(origin)) => times
            .iter()
            .map(|value| match value {
                TimeValue::Instant(instant) => {
                    let offset = *instant - *origin;
                    offset
                        .num_microseconds()
                        .map(|micros| micros as f64 / 1e6)
                        .ok_or_else(|| anyhow!("timestamp span overflows"))
                }
                TimeValue::Seconds(_) => Err(anyhow!("mixed numeric and datetime timestamps")),
            })
            .collect(),
    }
}

/// Parses a delimited weight export with `timestamp` and `weight_1..weight_4` columns.
pub fn parse_table(contents: &str) -> anyhow::Result<ChannelSeries> {
    let mut lines = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());
    let (_, header) = lines.next().context("table is empty")?;
    let delimiter = if header.contains('\t') { '\t' } else { ',' };
    let columns: Vec<String> = header
        .split(delimiter)
        .map(|name| clean(name).to_ascii_lowercase())
        .collect();

    let position = |name: &str| columns.iter().position(|column| column == name);
    let time_index = position(TIMESTAMP_COLUMN)
        .ok_or_else(|| anyhow!("no column named '{}'", TIMESTAMP_COLUMN))?;
    let mut weight_indices = [0usize; CHANNEL_COUNT];
    for (slot, name) in weight_indices.iter_mut().zip(WEIGHT_COLUMNS) {
        *slot = position(name).ok_or_else(|| anyhow!("no column named '{}'", name))?;
    }

    let mut times = Vec::new();
    let mut channels: [Vec<f64>; CHANNEL_COUNT] = Default::default();
    for (line_index, line) in lines {
        let line_number = line_index + 1;
        let fields: Vec<&str> = line.split(delimiter).map(clean).collect();
        let field = |index: usize| {
            fields
                .get(index)
                .copied()
                .ok_or_else(|| anyhow!("line {} is missing column {}", line_number, index + 1))
        };

        let raw_time = field(time_index)?;
        let time = parse_time(raw_time)
            .ok_or_else(|| anyhow!("line {}: unreadable timestamp '{}'", line_number, raw_time))?;
        times.push(time);

        for (samples, &index) in channels.iter_mut().zip(&weight_indices) {
            let raw = field(index)?;
            let value = raw
                .parse::<f64>()
                .with_context(|| format!("line {}: unreadable weight '{}'", line_number, raw))?;
            samples.push(value);
        }
    }

    if times.len() < 2 {
        bail!(
            "not enough samples to determine sampling frequency ({} rows)",
            times.len()
        );
    }

    let timestamps = to_seconds(&times)?;
    Ok(ChannelSeries::new(timestamps, channels)?)
}

pub fn load_table<P: AsRef<Path>>(path: P) -> anyhow::Result<ChannelSeries> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref)
        .with_context(|| format!("reading weight table {}", path_ref.display()))?;
    parse_table(&contents).with_context(|| format!("parsing weight table {}", path_ref.display()))
}

/// Lists `*.csv` and `*.txt` files directly inside `folder`, sorted by name.
pub fn list_tables<P: AsRef<Path>>(folder: P) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let folder_ref = folder.as_ref();
    let mut files = Vec::new();
    for entry in fs::read_dir(folder_ref)
        .with_context(|| format!("listing folder {}", folder_ref.display()))?
    {
        let path = entry?.path();
        let is_table = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        if path.is_file() && is_table {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn numeric_timestamps_are_kept_as_seconds() {
        let table = "timestamp,weight_1,weight_2,weight_3,weight_4\n\
                     0.00,1,2,3,4\n\
                     0.01,5,6,7,8\n";
        let series = parse_table(table).unwrap();
        assert_eq!(series.timestamps(), &[0.0, 0.01]);
        assert_eq!(series.channel_vec(3), vec![4.0, 8.0]);
    }

    #[test]
    fn datetime_timestamps_become_offsets() {
        let table = "weight_4\tweight_3\tweight_2\tweight_1\ttimestamp\textra\n\
                     4\t3\t2\t1\t2024-05-01 10:00:00.000\tx\n\
                     8\t7\t6\t5\t2024-05-01 10:00:00.250\ty\n";
        let series = parse_table(table).unwrap();
        assert_eq!(series.timestamps(), &[0.0, 0.25]);
        assert_eq!(series.channel_vec(0), vec![1.0, 5.0]);
    }

    #[test]
    fn rfc3339_timestamps_are_accepted() {
        let table = "timestamp,weight_1,weight_2,weight_3,weight_4\n\
                     2024-05-01T10:00:00Z,0,0,0,0\n\
                     2024-05-01T10:00:01.5Z,0,0,0,0\n";
        let series = parse_table(table).unwrap();
        assert_eq!(series.timestamps(), &[0.0, 1.5]);
    }

    #[test]
    fn missing_timestamp_column_is_reported() {
        let err = parse_table("time,weight_1,weight_2,weight_3,weight_4\n0,1,2,3,4\n").unwrap_err();
        assert!(err.to_string().contains("timestamp"));
    }

    #[test]
    fn single_row_is_rejected() {
        let table = "timestamp,weight_1,weight_2,weight_3,weight_4\n0,1,2,3,4\n";
        assert!(parse_table(table).is_err());
    }

    #[test]
    fn bad_weight_reports_line() {
        let table = "timestamp,weight_1,weight_2,weight_3,weight_4\n0,1,2,3,4\n1,1,abc,3,4\n";
        let err = parse_table(table).unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"));
    }

    #[test]
    fn load_table_reads_file() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"timestamp,weight_1,weight_2,weight_3,weight_4\n0,1,1,1,1\n0.5,2,2,2,2\n")
            .unwrap();
        let series = load_table(temp.path()).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn list_tables_filters_extensions() {
        let dir = tempdir().unwrap();
        for name in ["b.csv", "a.txt", "notes.md"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let files = list_tables(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["a.txt", "b.csv"]);
    }
}
