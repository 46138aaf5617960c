use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use shadowstream_session::{NameMap, Sample};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct NodeOutput<'a> {
    key: u32,
    name: Option<&'a str>,
    values: &'a [f32],
}

#[derive(Serialize)]
struct SampleOutput<'a> {
    sequence: u64,
    timestamp: String,
    nodes: Vec<NodeOutput<'a>>,
}

#[derive(Serialize)]
struct NameOutput<'a> {
    key: u32,
    name: &'a str,
}

#[derive(Serialize)]
struct NamesOutput<'a> {
    endpoint: &'a str,
    nodes: Vec<NameOutput<'a>>,
}

pub fn print_sample(sequence: u64, sample: &Sample, names: Option<&NameMap>, format: OutputFormat) {
    let nodes: Vec<NodeOutput<'_>> = sample
        .iter()
        .map(|(key, values)| NodeOutput {
            key,
            name: names.and_then(|map| map.get(key)),
            values,
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let out = SampleOutput {
                sequence,
                timestamp: now_unix_millis(),
                nodes,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SAMPLE", "KEY", "NAME", "VALUES"]);
            for node in &nodes {
                table.add_row(vec![
                    sequence.to_string(),
                    node.key.to_string(),
                    node.name.unwrap_or("-").to_string(),
                    format_values(node.values),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for node in &nodes {
                println!(
                    "sample={} key={} ({}) values=[{}]",
                    sequence,
                    node.key,
                    node.name.unwrap_or("unnamed"),
                    format_values(node.values)
                );
            }
        }
    }
}

pub fn print_names(endpoint: &str, names: &NameMap, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = NamesOutput {
                endpoint,
                nodes: names
                    .iter()
                    .map(|(key, name)| NameOutput { key, name })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "NAME"]);
            for (key, name) in names.iter() {
                table.add_row(vec![key.to_string(), name.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("endpoint={} nodes={}", endpoint, names.len());
            for (key, name) in names.iter() {
                println!("  {key:>4}  {name}");
            }
        }
    }
}

fn format_values(values: &[f32]) -> String {
    values
        .iter()
        .map(|value| format!("{value:.4}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_use_fixed_precision() {
        assert_eq!(format_values(&[1.0, -0.5, 0.123456]), "1.0000 -0.5000 0.1235");
        assert_eq!(format_values(&[]), "");
    }

    #[test]
    fn sample_json_resolves_names() {
        let names: NameMap = [(1, "Hips".to_string())].into_iter().collect();
        let sample: Sample = [(1u32, vec![1.5f32]), (2, vec![])].into_iter().collect();

        let nodes: Vec<NodeOutput<'_>> = sample
            .iter()
            .map(|(key, values)| NodeOutput {
                key,
                name: names.get(key),
                values,
            })
            .collect();
        let json = serde_json::to_value(&nodes).unwrap();

        assert_eq!(json[0]["name"], "Hips");
        assert_eq!(json[0]["values"][0], 1.5);
        assert!(json[1]["name"].is_null());
    }
}
