use std::io::Write;
use std::path::Path;

use anyhow::Result;
#[cfg(feature = "colored-output")]
use colored::*;
use platforms_resolver::{LiveStatus, ResolutionResult};
use serde::Serialize;

use crate::cli::OutputFormat;

pub struct OutputManager {
    colored: bool,
}

impl OutputManager {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    pub fn format_resolution(
        &self,
        result: &ResolutionResult,
        selected: Option<&str>,
        format: OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(self.format_resolution_pretty(result, selected)),
            OutputFormat::Json => Self::format_json(&ResolutionOutput { selected, result }, true),
            OutputFormat::JsonCompact => {
                Self::format_json(&ResolutionOutput { selected, result }, false)
            }
        }
    }

    pub fn format_live(&self, statuses: &[LiveStatus], format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(self.format_live_pretty(statuses)),
            OutputFormat::Json => Self::format_json(&statuses, true),
            OutputFormat::JsonCompact => Self::format_json(&statuses, false),
        }
    }

    fn format_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
        let mut json = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        json.push('\n');
        Ok(json)
    }

    fn format_resolution_pretty(&self, result: &ResolutionResult, selected: Option<&str>) -> String {
        let mut output = String::new();
        output.push_str(&self.colorize(
            &format!("Resolved ({}):", result.kind()),
            &Color::Green,
            true,
        ));
        output.push('\n');

        match result {
            ResolutionResult::Manifest(manifest) => {
                for variant in manifest.variants() {
                    let mut details = Vec::new();
                    if let Some(resolution) = &variant.resolution {
                        details.push(resolution.clone());
                    }
                    if variant.bandwidth > 0 {
                        details.push(format!("{} kbps", variant.bandwidth / 1000));
                    }
                    if let Some(codecs) = &variant.codecs {
                        details.push(codecs.clone());
                    }
                    self.push_entry(&mut output, &variant.label(), &details.join(", "), &variant.url);
                }
            }
            ResolutionResult::StructuredFormats(formats) => {
                for format in formats {
                    self.push_entry(
                        &mut output,
                        &format.quality_label,
                        &format!("itag {}", format.itag),
                        &format.url,
                    );
                }
            }
            ResolutionResult::ExtractorFormats(formats) => {
                for format in formats {
                    let size = format
                        .file_size
                        .map(|bytes| format!(", {:.1} MiB", bytes as f64 / (1024.0 * 1024.0)))
                        .unwrap_or_default();
                    self.push_entry(
                        &mut output,
                        &format.codec_info,
                        size.trim_start_matches(", "),
                        &format.url,
                    );
                }
            }
            ResolutionResult::RawUrls(urls) => {
                for url in urls {
                    output.push_str(&format!("  {}\n", self.colorize(url, &Color::Blue, false)));
                }
            }
        }

        if let Some(url) = selected {
            output.push_str(&format!(
                "{}: {}\n",
                self.colorize("Selected", &Color::Yellow, true),
                self.colorize(url, &Color::Blue, false)
            ));
        }
        output
    }

    fn push_entry(&self, output: &mut String, name: &str, details: &str, url: &str) {
        output.push_str(&format!("  {}", self.colorize(name, &Color::Cyan, true)));
        if !details.is_empty() {
            output.push_str(&format!(" ({details})"));
        }
        output.push('\n');
        output.push_str(&format!("    {}\n", self.colorize(url, &Color::Blue, false)));
    }

    fn format_live_pretty(&self, statuses: &[LiveStatus]) -> String {
        if statuses.is_empty() {
            return "No channels.\n".to_string();
        }
        let mut output = String::new();
        for status in statuses {
            let marker = if status.is_live {
                self.colorize("LIVE", &Color::Green, true)
            } else {
                self.colorize("off ", &Color::Yellow, false)
            };
            output.push_str(&format!(
                "{marker} {}",
                self.colorize(&status.channel.display_name, &Color::Cyan, true)
            ));
            if let Some(viewers) = status.viewer_count {
                output.push_str(&format!(" [{viewers} viewers]"));
            }
            if let Some(title) = &status.title {
                output.push_str(&format!(" {title}"));
            }
            output.push('\n');
        }
        output
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (self.colored, color, bold);
            text.to_string()
        }
    }
}

#[derive(Serialize)]
struct ResolutionOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    selected: Option<&'a str>,
    result: &'a ResolutionResult,
}

enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
}

pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    match output_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        None => {
            print!("{content}");
            std::io::stdout().flush()?;
        }
    }
    Ok(())
}
