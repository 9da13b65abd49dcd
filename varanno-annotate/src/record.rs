//! Call-record parsing: the `#CHROM` header line and the tab-separated
//! record lines that follow it.

use crate::config::Caller;
use crate::errors::{AnnotateError, AnnotateResult};

pub const MISSING: &str = ".";

/// A sample column picked out of the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleColumn {
    pub index: usize,
    pub name: String,
}

///
/// Column layout declared by the `#CHROM` header line. Fixed columns are
/// located by name (case-insensitive), every column after `FORMAT` is a sample.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    columns: Vec<String>,
    pub chrom: usize,
    pub pos: usize,
    pub id: Option<usize>,
    pub reference: usize,
    pub alternate: usize,
    pub qual: Option<usize>,
    pub filter: Option<usize>,
    pub info: Option<usize>,
    pub format: Option<usize>,
    samples: Vec<SampleColumn>,
}

fn find_column(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| {
        c.trim_start_matches('#').eq_ignore_ascii_case(name)
    })
}

impl RecordHeader {
    pub fn is_header_line(line: &str) -> bool {
        line.starts_with("#CHROM") || line.starts_with("#chrom")
    }

    ///
    /// Parse the `#CHROM` line. `CHROM`, `POS`, `REF` and `ALT` are
    /// mandatory.
    ///
    pub fn parse(line_num: usize, line: &str) -> AnnotateResult<Self> {
        let columns: Vec<String> = line
            .trim_end_matches(['\n', '\r'])
            .split('\t')
            .map(|c| c.trim().to_string())
            .collect();

        let required = |name: &str| {
            find_column(&columns, name).ok_or_else(|| AnnotateError::MalformedRecord {
                line: line_num,
                msg: format!("header has no {} column", name),
            })
        };
        let chrom = required("CHROM")?;
        let pos = required("POS")?;
        let reference = required("REF")?;
        let alternate = required("ALT")?;
        let format = find_column(&columns, "FORMAT");

        let fixed = [
            Some(chrom),
            Some(pos),
            Some(reference),
            Some(alternate),
            find_column(&columns, "ID"),
            find_column(&columns, "QUAL"),
            find_column(&columns, "FILTER"),
            find_column(&columns, "INFO"),
            format,
        ];
        let samples = match format {
            Some(format) => columns
                .iter()
                .enumerate()
                .skip(format + 1)
                .filter(|(i, _)| !fixed.contains(&Some(*i)))
                .map(|(index, name)| SampleColumn {
                    index,
                    name: name.clone(),
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(RecordHeader {
            id: find_column(&columns, "ID"),
            qual: find_column(&columns, "QUAL"),
            filter: find_column(&columns, "FILTER"),
            info: find_column(&columns, "INFO"),
            columns,
            chrom,
            pos,
            reference,
            alternate,
            format,
            samples,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn samples(&self) -> &[SampleColumn] {
        &self.samples
    }

    ///
    /// Pick the sample column to read genotype fields from.
    ///
    /// A column matches when its name equals `sample` (case-insensitive,
    /// also after replacing `_` by `-`), when it is the `Unknown` placeholder,
    /// when it is the `TUMOR` column of a Mutect call set, or when it is the
    /// only sample column. The first matching column wins.
    ///
    pub fn select_sample(&self, sample: Option<&str>, caller: Caller) -> Option<&SampleColumn> {
        let only_one = self.samples.len() == 1;
        self.samples.iter().find(|column| {
            let name = column.name.as_str();
            let by_name = sample.is_some_and(|sample| {
                name.eq_ignore_ascii_case(sample)
                    || name.replace('_', "-").eq_ignore_ascii_case(sample)
            });
            by_name
                || name.eq_ignore_ascii_case("Unknown")
                || (caller == Caller::Mutect && name.eq_ignore_ascii_case("TUMOR"))
                || only_one
        })
    }
}

///
/// One record line split into its columns.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcfRecord {
    pub line: usize,
    columns: Vec<String>,
}

impl VcfRecord {
    pub fn parse(header: &RecordHeader, line_num: usize, line: &str) -> AnnotateResult<Self> {
        let columns: Vec<String> = line
            .trim_end_matches(['\n', '\r'])
            .split('\t')
            .map(str::to_string)
            .collect();

        let needed = [header.chrom, header.pos, header.reference, header.alternate];
        if let Some(max) = needed.iter().max() {
            if columns.len() <= *max {
                return Err(AnnotateError::MalformedRecord {
                    line: line_num,
                    msg: format!(
                        "expected at least {} columns, found {}",
                        max + 1,
                        columns.len()
                    ),
                });
            }
        }

        let pos = columns[header.pos].trim();
        if !matches!(pos.parse::<u64>(), Ok(p) if p > 0) {
            return Err(AnnotateError::MalformedRecord {
                line: line_num,
                msg: format!("invalid position '{}'", pos),
            });
        }

        Ok(VcfRecord {
            line: line_num,
            columns,
        })
    }

    pub fn column(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    fn optional(&self, index: Option<usize>) -> Option<&str> {
        index.and_then(|i| self.column(i))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn chrom<'a>(&'a self, header: &RecordHeader) -> &'a str {
        self.column(header.chrom).unwrap_or_default()
    }

    pub fn pos(&self, header: &RecordHeader) -> u64 {
        self.column(header.pos)
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or_default()
    }

    pub fn reference<'a>(&'a self, header: &RecordHeader) -> &'a str {
        self.column(header.reference).unwrap_or_default()
    }

    /// Alternate alleles, in record order.
    pub fn alternates<'a>(&'a self, header: &RecordHeader) -> Vec<&'a str> {
        self.column(header.alternate)
            .unwrap_or_default()
            .split(',')
            .collect()
    }

    pub fn id<'a>(&'a self, header: &RecordHeader) -> Option<&'a str> {
        self.optional(header.id)
            .filter(|id| !id.is_empty() && *id != MISSING)
    }

    pub fn qual<'a>(&'a self, header: &RecordHeader) -> Option<&'a str> {
        self.optional(header.qual)
    }

    pub fn filter<'a>(&'a self, header: &RecordHeader) -> Option<&'a str> {
        self.optional(header.filter)
    }

    ///
    /// INFO entries as `(key, value)` pairs; bare flags have no value.
    ///
    pub fn info_entries<'a>(&'a self, header: &RecordHeader) -> Vec<(&'a str, Option<&'a str>)> {
        match self.optional(header.info) {
            None | Some(MISSING) | Some("") => Vec::new(),
            Some(info) => info
                .split(';')
                .filter(|entry| !entry.is_empty())
                .map(|entry| match entry.split_once('=') {
                    Some((key, value)) => (key, Some(value)),
                    None => (entry, None),
                })
                .collect(),
        }
    }

    pub fn info_value<'a>(&'a self, header: &RecordHeader, key: &str) -> Option<&'a str> {
        self.info_entries(header)
            .into_iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v)
    }

    pub fn format_keys<'a>(&'a self, header: &RecordHeader) -> Vec<&'a str> {
        match self.optional(header.format) {
            Some(format) if !format.is_empty() => format.split(':').collect(),
            _ => Vec::new(),
        }
    }

    ///
    /// `(key, value)` pairs of one sample column, in `FORMAT` order. Trailing
    /// keys dropped by the caller are left out.
    ///
    pub fn sample_entries<'a>(
        &'a self,
        header: &RecordHeader,
        sample: &SampleColumn,
    ) -> Vec<(&'a str, &'a str)> {
        let Some(values) = self.column(sample.index) else {
            return Vec::new();
        };
        self.format_keys(header)
            .into_iter()
            .zip(values.split(':'))
            .collect()
    }

    pub fn sample_value<'a>(
        &'a self,
        header: &RecordHeader,
        sample: &SampleColumn,
        key: &str,
    ) -> Option<&'a str> {
        self.sample_entries(header, sample)
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    const HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNORMAL\tTUMOR";

    #[fixture]
    fn header() -> RecordHeader {
        RecordHeader::parse(1, HEADER).unwrap()
    }

    #[rstest]
    fn test_header_columns(header: RecordHeader) {
        assert_eq!((header.chrom, header.pos, header.reference, header.alternate), (0, 1, 3, 4));
        assert_eq!(header.format, Some(8));
        let names: Vec<&str> = header.samples().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["NORMAL", "TUMOR"]);
    }

    #[rstest]
    fn test_header_requires_mandatory_columns() {
        let result = RecordHeader::parse(3, "#CHROM\tPOS\tREF");
        assert_eq!(
            matches!(result, Err(AnnotateError::MalformedRecord { line: 3, .. })),
            true
        );
    }

    #[rstest]
    #[case(Some("tumor"), Caller::Generic, Some("TUMOR"))]
    #[case(None, Caller::Mutect, Some("TUMOR"))]
    #[case(None, Caller::Generic, None)]
    #[case(Some("other"), Caller::Gatk, None)]
    fn test_select_sample(
        header: RecordHeader,
        #[case] sample: Option<&str>,
        #[case] caller: Caller,
        #[case] expected: Option<&str>,
    ) {
        let selected = header.select_sample(sample, caller).map(|s| s.name.as_str());
        assert_eq!(selected, expected);
    }

    #[rstest]
    fn test_select_sample_dash_and_single_column() {
        let header = RecordHeader::parse(1, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS_01").unwrap();
        assert_eq!(header.select_sample(Some("s-01"), Caller::Generic).map(|s| s.index), Some(9));
        // the only sample column is used whatever the requested name
        assert_eq!(header.select_sample(Some("x"), Caller::Generic).map(|s| s.index), Some(9));
    }

    #[rstest]
    fn test_record_accessors(header: RecordHeader) {
        let line = "chr1\t100\t.\tA\tG,T\t50\tPASS\tAC=1,2;DB;ANN=G|x\tGT:AD\t0/1:5,3,0\t1/2:1,4,5";
        let record = VcfRecord::parse(&header, 2, line).unwrap();

        assert_eq!(record.chrom(&header), "chr1");
        assert_eq!(record.pos(&header), 100);
        assert_eq!(record.alternates(&header), vec!["G", "T"]);
        assert_eq!(record.id(&header), None);
        assert_eq!(
            record.info_entries(&header),
            vec![("AC", Some("1,2")), ("DB", None), ("ANN", Some("G|x"))]
        );
        let tumor = &header.samples()[1];
        assert_eq!(record.sample_value(&header, tumor, "AD"), Some("1,4,5"));
        assert_eq!(record.sample_value(&header, tumor, "PL"), None);
    }

    #[rstest]
    fn test_short_record_is_malformed(header: RecordHeader) {
        let result = VcfRecord::parse(&header, 7, "1\t100\t.");
        assert_eq!(
            matches!(result, Err(AnnotateError::MalformedRecord { line: 7, .. })),
            true
        );
    }

    #[rstest]
    fn test_bad_position_is_malformed(header: RecordHeader) {
        let result = VcfRecord::parse(&header, 4, "1\tabc\t.\tA\tG");
        assert_eq!(result.is_err(), true);
    }
}
