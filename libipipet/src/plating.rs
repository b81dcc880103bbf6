use fxhash::FxHashSet;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::io::Read;

use super::dialect::{normalize_text, Dialect};
use super::error::PlatingError;
use super::plate::{PlateGeometry, WellAddress};

const MANDATORY_FIELDS: usize = 4; //src plate, src well, dest plate, dest well
const VOLUME_FIELD: usize = 4;
const SPECIMEN_FIELD: usize = 5;

/// Which of the trailing, positionally gated columns the parser should read.
///
/// Columns that are not enabled are ignored even if present in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionalFields {
    None,
    Volume,
    #[default]
    VolumeAndSpecimen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParserOptions {
    pub geometry: PlateGeometry,
    pub optional_fields: OptionalFields,
}

impl ParserOptions {
    pub fn new(geometry: PlateGeometry) -> Self {
        Self {
            geometry,
            optional_fields: OptionalFields::default(),
        }
    }
}

/// The optional tail of a step. A specimen name can only exist alongside a volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispense {
    pub volume: f64,
    pub specimen_name: Option<String>,
}

/// A single liquid transfer from a source well to a destination well
#[derive(Debug, Clone, PartialEq)]
pub struct PlatingStep {
    pub step_number: usize,
    pub source_plate: String,
    pub source_well: WellAddress,
    pub dest_plate: String,
    pub dest_well: WellAddress,
    pub dispense: Option<Dispense>,
}

impl PlatingStep {
    pub fn volume(&self) -> Option<f64> {
        self.dispense.as_ref().map(|d| d.volume)
    }

    pub fn specimen_name(&self) -> Option<&str> {
        self.dispense
            .as_ref()
            .and_then(|d| d.specimen_name.as_deref())
    }

    /// Number of elements in the positional form of this step (7, 8 or 9)
    pub fn positional_len(&self) -> usize {
        match &self.dispense {
            None => 7,
            Some(Dispense {
                specimen_name: None,
                ..
            }) => 8,
            Some(_) => 9,
        }
    }
}

// The run page indexes these arrays by position:
// [step, src plate, src index, src name, dest plate, dest index, dest name, (volume), (specimen)]
impl Serialize for PlatingStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.positional_len()))?;
        seq.serialize_element(&self.step_number)?;
        seq.serialize_element(&self.source_plate)?;
        seq.serialize_element(&self.source_well.index())?;
        seq.serialize_element(&self.source_well.name())?;
        seq.serialize_element(&self.dest_plate)?;
        seq.serialize_element(&self.dest_well.index())?;
        seq.serialize_element(&self.dest_well.name())?;
        if let Some(dispense) = &self.dispense {
            seq.serialize_element(&dispense.volume)?;
            if let Some(name) = &dispense.specimen_name {
                seq.serialize_element(name)?;
            }
        }
        seq.end()
    }
}

#[derive(Debug, Serialize)]
struct DataPayload<'a> {
    data: &'a [PlatingStep],
}

/// The ordered steps parsed from one plating file.
///
/// Order is the order of the file and is the order the user is guided through.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatingRun {
    geometry: PlateGeometry,
    steps: Vec<PlatingStep>,
}

impl PlatingRun {
    pub fn geometry(&self) -> PlateGeometry {
        self.geometry
    }

    pub fn steps(&self) -> &[PlatingStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlatingStep> {
        self.steps.iter()
    }

    /// Distinct source plate labels, sorted
    pub fn source_plates(&self) -> Vec<String> {
        distinct_sorted(self.steps.iter().map(|s| s.source_plate.as_str()))
    }

    /// Distinct destination plate labels, sorted
    pub fn dest_plates(&self) -> Vec<String> {
        distinct_sorted(self.steps.iter().map(|s| s.dest_plate.as_str()))
    }

    /// Serialize as the `{"data": [...]}` payload consumed by the run page
    pub fn to_json_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&DataPayload { data: &self.steps })
    }
}

impl<'a> IntoIterator for &'a PlatingRun {
    type Item = &'a PlatingStep;
    type IntoIter = std::slice::Iter<'a, PlatingStep>;
    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

fn distinct_sorted<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<String> {
    let set: FxHashSet<&str> = labels.collect();
    let mut plates: Vec<String> = set.into_iter().map(String::from).collect();
    plates.sort();
    plates
}

/// PlatingParser turns the bytes of a plating CSV into a PlatingRun.
///
/// The first row is always treated as a header and discarded, whatever it contains. Any bad
/// row aborts the whole parse; the error carries the 1-based line number of that row.
#[derive(Debug, Clone, Default)]
pub struct PlatingParser {
    options: ParserOptions,
}

impl PlatingParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    pub fn parse<R: Read>(&self, mut rdr: R) -> Result<PlatingRun, PlatingError> {
        let mut contents = Vec::new();
        rdr.read_to_end(&mut contents)?;
        self.parse_bytes(&contents)
    }

    pub fn parse_bytes(&self, contents: &[u8]) -> Result<PlatingRun, PlatingError> {
        let text = normalize_text(contents)?;
        let dialect = Dialect::sniff(&text)?;

        let mut steps: Vec<PlatingStep> = Vec::new();
        // Row 0 is the header even when it is a blank line
        for raw in dialect.records(&text).iter().skip(1) {
            let record = dialect
                .fields(raw)
                .map_err(|e| PlatingError::MalformedRow {
                    row: raw.line,
                    reason: e.to_string(),
                })?;
            let step = self.parse_row(&record, raw.line, steps.len() + 1)?;
            steps.push(step);
        }

        log::debug!(
            "Parsed {} plating steps for a {} plate",
            steps.len(),
            self.options.geometry
        );
        Ok(PlatingRun {
            geometry: self.options.geometry,
            steps,
        })
    }

    fn parse_row(
        &self,
        record: &csv::StringRecord,
        line: u64,
        step_number: usize,
    ) -> Result<PlatingStep, PlatingError> {
        if record.len() < MANDATORY_FIELDS {
            return Err(PlatingError::MalformedRow {
                row: line,
                reason: format!(
                    "expecting at least {MANDATORY_FIELDS} fields, found {}",
                    record.len()
                ),
            });
        }
        let geometry = self.options.geometry;
        let source_well =
            WellAddress::parse(&record[1], geometry).map_err(|e| PlatingError::from_well(line, e))?;
        let dest_well =
            WellAddress::parse(&record[3], geometry).map_err(|e| PlatingError::from_well(line, e))?;

        let dispense = match (self.options.optional_fields, record.get(VOLUME_FIELD)) {
            (OptionalFields::None, _) | (_, None) => None,
            (fields, Some(volume)) => {
                let volume: f64 = volume
                    .parse()
                    .ok()
                    .filter(|v: &f64| v.is_finite())
                    .ok_or_else(|| PlatingError::MalformedRow {
                        row: line,
                        reason: format!("invalid volume '{volume}'"),
                    })?;
                let specimen_name = match fields {
                    OptionalFields::VolumeAndSpecimen => {
                        record.get(SPECIMEN_FIELD).map(String::from)
                    }
                    _ => None,
                };
                Some(Dispense {
                    volume,
                    specimen_name,
                })
            }
        };

        Ok(PlatingStep {
            step_number,
            source_plate: record[0].to_string(),
            source_well,
            dest_plate: record[2].to_string(),
            dest_well,
            dispense,
        })
    }
}

/// Parse a plating CSV with every optional column enabled
pub fn load_plating_csv<R: Read>(
    rdr: R,
    geometry: PlateGeometry,
) -> Result<PlatingRun, PlatingError> {
    PlatingParser::new(ParserOptions::new(geometry)).parse(rdr)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "src,srcwell,dst,dstwell,volume,specimen\n";

    fn parse96(body: &str) -> Result<PlatingRun, PlatingError> {
        load_plating_csv(format!("{HEADER}{body}").as_bytes(), PlateGeometry::Wells96)
    }

    #[test]
    fn test_single_full_row() {
        let run = parse96("P1,1,P2,5,12.5,Sample_A\n").unwrap();
        assert_eq!(run.len(), 1);
        let step = &run.steps()[0];
        assert_eq!(step.step_number, 1);
        assert_eq!(step.source_plate, "P1");
        assert_eq!(step.source_well.index(), 1);
        assert_eq!(step.source_well.name().as_str(), "A01");
        assert_eq!(step.dest_plate, "P2");
        assert_eq!(step.dest_well.index(), 5);
        assert_eq!(step.dest_well.name().as_str(), "E01");
        assert_eq!(step.volume(), Some(12.5));
        assert_eq!(step.specimen_name(), Some("Sample_A"));
    }

    #[test]
    fn test_positional_payload() {
        let run = parse96("P1,1,P2,5,12.5,Sample_A\nP1,9,P2,96\nP3,2,P4,3,4\n").unwrap();
        let payload = run.to_json_payload().unwrap();
        assert_eq!(
            payload,
            concat!(
                r#"{"data":[[1,"P1",1,"A01","P2",5,"E01",12.5,"Sample_A"],"#,
                r#"[2,"P1",9,"A02","P2",96,"H12"],"#,
                r#"[3,"P3",2,"B01","P4",3,"C01",4.0]]}"#
            )
        );
        let lens: Vec<usize> = run.iter().map(|s| s.positional_len()).collect();
        assert_eq!(lens, vec![9, 7, 8]);
    }

    #[test]
    fn test_header_always_skipped() {
        // Row 0 looks like data, but is still discarded
        let run = load_plating_csv(
            "P0,1,P0,1\nP1,2,P2,3\n".as_bytes(),
            PlateGeometry::Wells96,
        )
        .unwrap();
        assert_eq!(run.len(), 1);
        assert_eq!(run.steps()[0].source_plate, "P1");

        let header_only = parse96("").unwrap();
        assert!(header_only.is_empty());
    }

    #[test]
    fn test_too_few_fields_aborts() {
        let err = parse96("P1,1,P2,5\nP1,2,P2,6\nP1,3,P2\nP1,4,P2,8\n").unwrap_err();
        match err {
            PlatingError::MalformedRow { row, .. } => assert_eq!(row, 4),
            e => panic!("unexpected error {e}"),
        }
    }

    #[test]
    fn test_non_numeric_well() {
        let err = parse96("P1,abc,P2,5\n").unwrap_err();
        assert!(matches!(err, PlatingError::MalformedRow { row: 2, .. }));
        let err = parse96("P1,1,P2,5\nP1,1,P2,x7\n").unwrap_err();
        assert_eq!(err.row(), Some(3));
    }

    #[test]
    fn test_out_of_range_well() {
        let err = parse96("P1,97,P2,5\n").unwrap_err();
        assert!(matches!(
            err,
            PlatingError::OutOfRangeWell {
                row: 2,
                index: 97,
                geometry: PlateGeometry::Wells96
            }
        ));
        let run = load_plating_csv(
            format!("{HEADER}P1,97,P2,384\n").as_bytes(),
            PlateGeometry::Wells384,
        )
        .unwrap();
        assert_eq!(run.steps()[0].source_well.name().as_str(), "A07");
        assert_eq!(run.steps()[0].dest_well.name().as_str(), "P24");
    }

    #[test]
    fn test_bad_volume() {
        let err = parse96("P1,1,P2,5,lots\n").unwrap_err();
        assert!(matches!(err, PlatingError::MalformedRow { row: 2, .. }));
    }

    #[test]
    fn test_volume_must_be_finite() {
        for volume in ["nan", "NaN", "inf", "-inf", "infinity"] {
            let err = parse96(&format!("P1,1,P2,5,2\nP1,2,P2,6,{volume}\n")).unwrap_err();
            assert!(matches!(err, PlatingError::MalformedRow { row: 3, .. }));
        }
        let run = parse96("P1,1,P2,5,1e3\n").unwrap();
        assert_eq!(run.steps()[0].volume(), Some(1000.0));
    }

    #[test]
    fn test_blank_row_aborts() {
        let err = parse96("P1,1,P2,5\n\nP1,2,P2,6\n").unwrap_err();
        match err {
            PlatingError::MalformedRow { row, reason } => {
                assert_eq!(row, 3);
                assert_eq!(reason, "expecting at least 4 fields, found 0");
            }
            e => panic!("unexpected error {e}"),
        }
        let err = parse96("P1,1,P2,5\n   \nP1,2,P2,6\n").unwrap_err();
        assert_eq!(err.row(), Some(3));
    }

    #[test]
    fn test_leading_blank_line_is_the_header() {
        // The blank line takes the header's place, so the real header is read as a step
        let err = load_plating_csv(
            format!("\n{HEADER}P1,1,P2,5\n").as_bytes(),
            PlateGeometry::Wells96,
        )
        .unwrap_err();
        assert!(matches!(err, PlatingError::MalformedRow { row: 2, .. }));

        let run = load_plating_csv("\nP1,1,P2,5\n".as_bytes(), PlateGeometry::Wells96).unwrap();
        assert_eq!(run.len(), 1);
    }

    #[test]
    fn test_quoted_specimen_spanning_lines() {
        let body = "P1,1,P2,5,1.0,\"line one\nline two\"\nP1,2,P2,6,1.0,x\n";
        let run = parse96(body).unwrap();
        assert_eq!(run.len(), 2);
        assert_eq!(run.steps()[0].specimen_name(), Some("line one\nline two"));
        assert_eq!(run.steps()[1].specimen_name(), Some("x"));

        // Rows after the spanning field report their own starting line
        let err = parse96("P1,1,P2,5,1.0,\"line one\nline two\"\nP1,200,P2,6\n").unwrap_err();
        assert_eq!(err.row(), Some(4));
    }

    #[test]
    fn test_short_row_in_sample_reports_row() {
        let err = parse96("P1,1,P2,5\nP1\nP1,3,P2,7\n").unwrap_err();
        match err {
            PlatingError::MalformedRow { row, reason } => {
                assert_eq!(row, 3);
                assert_eq!(reason, "expecting at least 4 fields, found 1");
            }
            e => panic!("unexpected error {e}"),
        }
    }

    #[test]
    fn test_optional_fields_disabled() {
        let body = format!("{HEADER}P1,1,P2,5,not-a-number,Sample_A\n");
        let parser = PlatingParser::new(ParserOptions {
            geometry: PlateGeometry::Wells96,
            optional_fields: OptionalFields::None,
        });
        let run = parser.parse(body.as_bytes()).unwrap();
        assert_eq!(run.steps()[0].dispense, None);

        let parser = PlatingParser::new(ParserOptions {
            geometry: PlateGeometry::Wells96,
            optional_fields: OptionalFields::Volume,
        });
        let run = parser
            .parse(format!("{HEADER}P1,1,P2,5,3.5,Sample_A\n").as_bytes())
            .unwrap();
        assert_eq!(run.steps()[0].volume(), Some(3.5));
        assert_eq!(run.steps()[0].specimen_name(), None);
    }

    #[test]
    fn test_whitespace_quotes_and_newlines() {
        let contents = "src;srcwell;dst;dstwell;volume;specimen\r\"Plate 1\"; 8 ; P2 ; 9 ; 1.5 ;\"Mouse; liver\"\r";
        let run = load_plating_csv(contents.as_bytes(), PlateGeometry::Wells96).unwrap();
        let step = &run.steps()[0];
        assert_eq!(step.source_plate, "Plate 1");
        assert_eq!(step.source_well.name().as_str(), "H01");
        assert_eq!(step.dest_well.name().as_str(), "A02");
        assert_eq!(step.specimen_name(), Some("Mouse; liver"));
    }

    #[test]
    fn test_order_and_determinism() {
        let body = "B,3,C,4\nA,1,C,2\nZ,96,Y,95\nA,2,C,3\n";
        let first = parse96(body).unwrap();
        let second = parse96(body).unwrap();
        assert_eq!(first, second);
        let sources: Vec<&str> = first.iter().map(|s| s.source_plate.as_str()).collect();
        assert_eq!(sources, vec!["B", "A", "Z", "A"]);
        let numbers: Vec<usize> = first.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(first.source_plates(), vec!["A", "B", "Z"]);
        assert_eq!(first.dest_plates(), vec!["C", "Y"]);
    }

    #[test]
    fn test_unparseable_file() {
        let err = load_plating_csv("".as_bytes(), PlateGeometry::Wells96).unwrap_err();
        assert!(matches!(err, PlatingError::UnparseableDialect(_)));
        assert_eq!(err.row(), None);
    }
}
