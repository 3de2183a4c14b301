//! Metric and label naming rules.

/// Joins the non-empty parts of a metric name with underscores.
///
/// Returns an empty string if `name` itself is empty, as a namespace and subsystem alone do not
/// make a metric.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Turns an arbitrary firehose name into a metric or label name fragment.
///
/// camelCase boundaries become underscores, anything outside of `[a-zA-Z0-9_]` becomes an
/// underscore, and the result is lowercased: `numCPUS` becomes `num_cpus` and `HTTPRequest.Count`
/// becomes `http_request_count`.
pub fn normalize_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut normalized = String::with_capacity(name.len() + 4);

    for (i, c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                let previous = chars[i - 1];
                let next_is_lower = chars.get(i + 1).map_or(false, char::is_ascii_lowercase);
                if previous.is_ascii_lowercase()
                    || previous.is_ascii_digit()
                    || (previous.is_ascii_uppercase() && next_is_lower)
                {
                    normalized.push('_');
                }
            }
            normalized.push(c.to_ascii_lowercase());
        } else if c.is_ascii_alphanumeric() || *c == '_' {
            normalized.push(*c);
        } else {
            normalized.push('_');
        }
    }

    normalized
}

/// Whether `name` is usable as a metric name: `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Whether `name` is usable as a label name: `[a-zA-Z_][a-zA-Z0-9_]*`, and not reserved by a
/// leading `__`.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }

    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::{build_fq_name, is_valid_label_name, is_valid_metric_name, normalize_name};

    #[test]
    fn test_build_fq_name() {
        assert_eq!(
            build_fq_name("firehose", "http_start_stop", "request_total"),
            "firehose_http_start_stop_request_total"
        );
        assert_eq!(build_fq_name("", "value_metrics", "cpu"), "value_metrics_cpu");
        assert_eq!(build_fq_name("firehose", "", "cpu"), "firehose_cpu");
        assert_eq!(build_fq_name("firehose", "value_metrics", ""), "");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("memory"), "memory");
        assert_eq!(normalize_name("numCPUS"), "num_cpus");
        assert_eq!(normalize_name("CPU.Load"), "cpu_load");
        assert_eq!(normalize_name("HTTPRequest.Count"), "http_request_count");
        assert_eq!(normalize_name("route_emitter.ms-since"), "route_emitter_ms_since");
        assert_eq!(normalize_name("cell2Capacity"), "cell2_capacity");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_metric_name_validity() {
        assert!(is_valid_metric_name("firehose_value_metrics_doppler_memory"));
        assert!(is_valid_metric_name("job:rate"));
        assert!(!is_valid_metric_name(""));
        assert!(!is_valid_metric_name("9lives"));
        assert!(!is_valid_metric_name("bad-name"));
    }

    #[test]
    fn test_label_name_validity() {
        assert!(is_valid_label_name("status_code"));
        assert!(is_valid_label_name("_hidden"));
        assert!(!is_valid_label_name("__name__"));
        assert!(!is_valid_label_name(""));
        assert!(!is_valid_label_name("1st"));
        assert!(!is_valid_label_name("job:rate"));
    }
}
