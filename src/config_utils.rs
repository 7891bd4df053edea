use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use yaml_rust::Yaml;


// A convenience type for parsing csv data
pub type Row = HashMap<String, String>;

/// Returns the trimmed value of a csv column, or None if the column is absent or empty.
pub fn get_field<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    match row.get(key) {
        Some(val) if !val.trim().is_empty() => Some(val.trim()),
        _ => None,
    }
}

/// Parses a csv column as a float.  Integers and decimals are both accepted.
pub fn get_f64_field(row: &Row, key: &str) -> Option<f64> {
    return get_field(row, key).and_then(|ss| ss.parse::<f64>().ok());
}

/// Parses a csv column as an unsigned integer, accepting values like "2.0".
pub fn get_u32_field(row: &Row, key: &str) -> Option<u32> {
    let val = get_f64_field(row, key)?;
    if val < 0. {
        return None;
    }
    return Some(val as u32);
}

/// yaml-rust keeps integers and reals apart, but the settings files treat them the same.
pub fn yaml_as_f64(yaml: &Yaml) -> Option<f64> {
    match yaml {
        Yaml::Real(_) => yaml.as_f64(),
        Yaml::Integer(ii) => Some(*ii as f64),
        Yaml::String(ss) => ss.parse().ok(),
        _ => None,
    }
}

pub fn yaml_as_string(yaml: &Yaml) -> Option<String> {
    match yaml {
        Yaml::String(ss) => Some(ss.clone()),
        Yaml::Integer(ii) => Some(ii.to_string()),
        Yaml::Real(rr) => Some(rr.clone()),
        _ => None,
    }
}

pub fn str_to_absolute_path(path_str: &str, default_base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        return path;
    } else {
        return [default_base_dir, Path::new(&path)].iter().collect();
    }
}

/// Converts a time period like "0700_0800" to its duration in minutes.
pub fn get_num_minutes_from_time_period(time_period: &str) -> Option<u32> {
    let parts: Vec<&str> = time_period.trim().split('_').collect();
    if parts.len() != 2 {
        return None;
    }
    let start = hhmm_to_minutes(parts[0])?;
    let end = hhmm_to_minutes(parts[1])?;
    if end <= start {
        return None;
    }
    return Some(end - start);
}

fn hhmm_to_minutes(hhmm: &str) -> Option<u32> {
    // four ascii digits, so slicing by byte stays on char boundaries
    if hhmm.len() != 4 || !hhmm.chars().all(|cc| cc.is_ascii_digit()) {
        return None;
    }
    let hours: u32 = hhmm[..2].parse().ok()?;
    let minutes: u32 = hhmm[2..].parse().ok()?;
    if hours > 24 || (hours == 24 && minutes > 0) || minutes >= 60 {
        return None;
    }
    return Some(hours * 60 + minutes);
}
