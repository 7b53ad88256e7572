//! The fixed configuration block placed ahead of the layer text.

use std::fmt;

/// Reference frequency of the opacity column, GHz.
pub const DEFAULT_FREQUENCY_GHZ: f64 = 225.0;

/// `am` configuration header: a single-frequency opacity and brightness
/// temperature computation against the cosmic background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmHeader {
    pub frequency_ghz: f64,
}

impl Default for AmHeader {
    fn default() -> Self {
        Self {
            frequency_ghz: DEFAULT_FREQUENCY_GHZ,
        }
    }
}

impl AmHeader {
    pub fn new(frequency_ghz: f64) -> Self {
        Self { frequency_ghz }
    }

    /// Full model input: this header followed by the layer text.
    pub fn compose(&self, layers: &str) -> String {
        let mut input = self.to_string();
        input.push_str(layers);
        input
    }
}

impl fmt::Display for AmHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let freq = self.frequency_ghz;
        writeln!(f)?;
        writeln!(f, "#")?;
        writeln!(f, "# This header is prepended to the atmospheric layers derived")?;
        writeln!(f, "# from GFS model data to form a complete am configuration file.")?;
        writeln!(f, "#")?;
        writeln!(f, "f {freq} GHz {freq} GHz 1 GHz")?;
        writeln!(f, "output f GHz tau Tb K")?;
        writeln!(f, "T0 2.7 K")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_header_lines() {
        let text = AmHeader::default().to_string();
        let directives: Vec<&str> = text
            .lines()
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();
        assert_eq!(
            directives,
            vec!["f 225 GHz 225 GHz 1 GHz", "output f GHz tau Tb K", "T0 2.7 K"]
        );
        assert!(text.ends_with("T0 2.7 K\n"));
    }

    #[test]
    fn test_configured_frequency() {
        let text = AmHeader::new(345.0).to_string();
        assert!(text.contains("\nf 345 GHz 345 GHz 1 GHz\n"));

        let text = AmHeader::new(86.5).to_string();
        assert!(text.contains("\nf 86.5 GHz 86.5 GHz 1 GHz\n"));
    }

    #[test]
    fn test_compose_appends_layers() {
        let header = AmHeader::default();
        let input = header.compose("layer\nPbase 1.0 mbar\n");
        assert!(input.starts_with(&header.to_string()));
        assert!(input.ends_with("T0 2.7 K\nlayer\nPbase 1.0 mbar\n"));
    }
}
