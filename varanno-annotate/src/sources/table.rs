use std::io::BufRead;

use fxhash::FxHashMap;
use tracing::{debug, info};

use varanno_core::utils::{get_dynamic_reader, strip_chr_prefix};

use crate::errors::{AnnotateError, AnnotateResult};
use crate::sources::{AnnotationSource, SourceDeclaration, SourceRow, Strategy};

type PositionIndex = FxHashMap<(String, u64), Vec<usize>>;

///
/// A tab-separated annotation table (plain or gzipped) held in memory and
/// indexed by position, and by gene for gene-keyed tables.
///
/// The first line is the header; a leading `#` is dropped.
///
#[derive(Debug)]
pub struct TsvSource {
    declaration: SourceDeclaration,
    columns: FxHashMap<String, usize>,
    rows: Vec<Vec<String>>,
    positions: PositionIndex,
    build_positions: FxHashMap<String, PositionIndex>,
    genes: FxHashMap<String, Vec<usize>>,
}

impl TsvSource {
    pub fn open(declaration: SourceDeclaration) -> AnnotateResult<Self> {
        let reader = get_dynamic_reader(&declaration.path)?;
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(line) => line?,
            None => {
                return Err(AnnotateError::Source {
                    name: declaration.name.clone(),
                    msg: "table is empty".to_string(),
                });
            }
        };

        let mut source = TsvSource::new(declaration, &header)?;
        for (i, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            source.push_row(i + 2, &line);
        }

        info!(
            "loaded {} rows from annotation source '{}'",
            source.rows.len(),
            source.declaration.name
        );
        Ok(source)
    }

    ///
    /// An empty table with the given header line. Fails when a column the
    /// declaration reads is not in the header.
    ///
    pub fn new(declaration: SourceDeclaration, header: &str) -> AnnotateResult<Self> {
        let columns: FxHashMap<String, usize> = header
            .trim_start_matches('#')
            .split('\t')
            .enumerate()
            .map(|(i, c)| (c.trim().to_string(), i))
            .collect();

        let mut required: Vec<&str> = declaration.value_columns().collect();
        let keys = &declaration.keys;
        match declaration.strategy {
            Strategy::Positional | Strategy::TranscriptIndexed => {
                if keys.build_positions.is_empty() {
                    required.extend([keys.chrom.as_str(), keys.pos.as_str()]);
                }
                for build in keys.build_positions.values() {
                    required.extend([build.chrom.as_str(), build.pos.as_str()]);
                }
            }
            Strategy::Gene => {}
        }
        required.extend(keys.gene_symbol.as_deref());
        required.extend(keys.gene_id.as_deref());
        if let Some(realign) = &declaration.realign {
            required.extend([
                realign.list.as_str(),
                realign.aaref.as_str(),
                realign.aapos.as_str(),
                realign.aaalt.as_str(),
            ]);
        }
        if let Some(missing) = required.iter().find(|c| !columns.contains_key(**c)) {
            return Err(AnnotateError::Source {
                name: declaration.name.clone(),
                msg: format!("column '{}' is not in the table header", missing),
            });
        }

        let build_positions = keys
            .build_positions
            .keys()
            .map(|build| (build.to_ascii_lowercase(), PositionIndex::default()))
            .collect();

        Ok(TsvSource {
            declaration,
            columns,
            rows: Vec::new(),
            positions: PositionIndex::default(),
            build_positions,
            genes: FxHashMap::default(),
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    fn locus(&self, values: &[String], chrom: &str, pos: &str) -> Option<(String, u64)> {
        let chrom = values.get(self.column(chrom)?)?;
        let pos = values.get(self.column(pos)?)?.trim().parse().ok()?;
        Some((strip_chr_prefix(chrom.trim()).to_string(), pos))
    }

    ///
    /// Add one data line. Lines whose key columns cannot be read are skipped.
    ///
    pub fn push_row(&mut self, line_num: usize, line: &str) {
        let values: Vec<String> = line.split('\t').map(str::to_string).collect();
        let index = self.rows.len();
        let keys = &self.declaration.keys;
        let mut indexed = false;

        if self.declaration.strategy != Strategy::Gene {
            if let Some(locus) = self.locus(&values, &keys.chrom, &keys.pos) {
                self.positions.entry(locus).or_default().push(index);
                indexed = true;
            }
            for (build, columns) in &keys.build_positions {
                if let Some(locus) = self.locus(&values, &columns.chrom, &columns.pos) {
                    if let Some(positions) = self.build_positions.get_mut(&build.to_ascii_lowercase()) {
                        positions.entry(locus).or_default().push(index);
                        indexed = true;
                    }
                }
            }
        } else {
            let gene_columns = [keys.gene_symbol.as_deref(), keys.gene_id.as_deref()];
            for column in gene_columns.into_iter().flatten() {
                let Some(value) = self.column(column).and_then(|c| values.get(c)) else {
                    continue;
                };
                for gene in value.split(';').map(str::trim).filter(|g| !g.is_empty()) {
                    self.genes.entry(gene.to_string()).or_default().push(index);
                    indexed = true;
                }
            }
        }

        if indexed {
            self.rows.push(values);
        } else {
            debug!(
                "source '{}' line {}: no usable key, skipped",
                self.declaration.name, line_num
            );
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn rows_at(&self, indices: Option<&Vec<usize>>) -> Vec<SourceRow<'_>> {
        indices
            .map(|indices| {
                indices
                    .iter()
                    .map(|i| SourceRow::new(&self.columns, &self.rows[*i]))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl AnnotationSource for TsvSource {
    fn declaration(&self) -> &SourceDeclaration {
        &self.declaration
    }

    fn by_position(&self, build: Option<&str>, chrom: &str, pos: u64) -> Vec<SourceRow<'_>> {
        let key = (strip_chr_prefix(chrom).to_string(), pos);
        match build {
            Some(build) => self.rows_at(
                self.build_positions
                    .get(&build.to_ascii_lowercase())
                    .and_then(|positions| positions.get(&key)),
            ),
            None => self.rows_at(self.positions.get(&key)),
        }
    }

    fn by_gene(&self, symbol: Option<&str>, gene_id: Option<&str>) -> Vec<SourceRow<'_>> {
        let mut indices: Vec<usize> = Vec::new();
        for gene in [symbol, gene_id].into_iter().flatten() {
            for index in self.genes.get(gene).into_iter().flatten() {
                if !indices.contains(index) {
                    indices.push(*index);
                }
            }
        }
        self.rows_at(Some(&indices))
    }
}
