//! Output of annotated variants, in schema column order.

use std::fmt::{self, Display};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use flate2::Compression;
use flate2::write::GzEncoder;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use varanno_core::utils::is_gzipped;

use crate::errors::{AnnotateError, AnnotateResult};
use crate::models::AnnotatedVariant;
use crate::schema::AnalysisSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Tab-separated, one header line.
    #[default]
    Tsv,
    /// One JSON object per line.
    Json,
}

impl FromStr for OutputFormat {
    type Err = AnnotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tsv" => Ok(OutputFormat::Tsv),
            "json" | "jsonl" => Ok(OutputFormat::Json),
            other => Err(AnnotateError::Config(format!("unknown output format '{}'", other))),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Tsv => write!(f, "tsv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

pub trait VariantWriter {
    fn write_variant(&mut self, variant: &AnnotatedVariant) -> AnnotateResult<()>;

    fn finish(&mut self) -> AnnotateResult<()>;
}

pub struct TsvWriter<W: Write> {
    inner: W,
}

impl<W: Write> TsvWriter<W> {
    /// Writes the header line right away.
    pub fn new(mut inner: W, schema: &AnalysisSchema) -> AnnotateResult<Self> {
        writeln!(inner, "{}", schema.names().collect::<Vec<&str>>().join("\t"))?;
        Ok(TsvWriter { inner })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> VariantWriter for TsvWriter<W> {
    fn write_variant(&mut self, variant: &AnnotatedVariant) -> AnnotateResult<()> {
        writeln!(self.inner, "{}", variant.to_tsv_row())?;
        Ok(())
    }

    fn finish(&mut self) -> AnnotateResult<()> {
        self.inner.flush()?;
        Ok(())
    }
}

pub struct JsonLinesWriter<W: Write> {
    inner: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(inner: W) -> Self {
        JsonLinesWriter { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> VariantWriter for JsonLinesWriter<W> {
    fn write_variant(&mut self, variant: &AnnotatedVariant) -> AnnotateResult<()> {
        serde_json::to_writer(&mut self.inner, variant)?;
        self.inner.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> AnnotateResult<()> {
        self.inner.flush()?;
        Ok(())
    }
}

///
/// Open a writer on `path` (gzipped when it ends in `.gz`), or on stdout.
///
pub fn open_writer(
    path: Option<&Path>,
    format: OutputFormat,
    schema: &AnalysisSchema,
) -> AnnotateResult<Box<dyn VariantWriter>> {
    let sink: Box<dyn Write> = match path {
        Some(path) if is_gzipped(path) => Box::new(BufWriter::new(GzEncoder::new(
            File::create(path)?,
            Compression::default(),
        ))),
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };

    Ok(match format {
        OutputFormat::Tsv => Box::new(TsvWriter::new(sink, schema)?),
        OutputFormat::Json => Box::new(JsonLinesWriter::new(sink)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Read;
    use std::sync::Arc;

    use flate2::read::MultiGzDecoder;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use tempfile::tempdir;

    const SCHEMA: &str = r#"
[[field]]
name = "chr"
type = "text"

[[field]]
name = "pos"
type = "long"

[[field]]
name = "cadd_phred"
type = "double"
"#;

    #[fixture]
    fn variant() -> AnnotatedVariant {
        let mut variant = AnnotatedVariant::new(Arc::new(AnalysisSchema::from_toml_str(SCHEMA).unwrap()));
        variant.set("chr", "7");
        variant.set("pos", 140453136_i64);
        variant
    }

    #[rstest]
    fn test_tsv(variant: AnnotatedVariant) {
        let mut writer = TsvWriter::new(Vec::new(), variant.schema()).unwrap();
        writer.write_variant(&variant).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text, "chr\tpos\tcadd_phred\n7\t140453136\t\n");
    }

    #[rstest]
    fn test_json_lines(variant: AnnotatedVariant) {
        let mut writer = JsonLinesWriter::new(Vec::new());
        writer.write_variant(&variant).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text, "{\"chr\":\"7\",\"pos\":140453136,\"cadd_phred\":null}\n");
    }

    #[rstest]
    fn test_gzipped_output(variant: AnnotatedVariant) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.tsv.gz");
        {
            let mut writer = open_writer(Some(&path), OutputFormat::Tsv, variant.schema()).unwrap();
            writer.write_variant(&variant).unwrap();
            writer.finish().unwrap();
        }
        let mut text = String::new();
        MultiGzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[rstest]
    #[case("TSV", OutputFormat::Tsv)]
    #[case("jsonl", OutputFormat::Json)]
    fn test_format_from_str(#[case] value: &str, #[case] expected: OutputFormat) {
        assert_eq!(value.parse::<OutputFormat>().unwrap(), expected);
    }
}
