//! HTML voter-roll extraction.
//!
//! Parses one roll document into a [`WardRecord`]: header metadata read from
//! the first table at fixed cell offsets, voter rows read from the
//! `tbody.voters-list` body at fixed column positions. The positional layout
//! is a structural convention of the source reports, not a labeled one, so
//! markup drift shows up as a parse error rather than silently shifted
//! fields.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

use rollcall_shared::{Age, Result, RollcallError, VoterRecord, WardRecord};

/// Metadata cell offsets in the flattened `<td>` list of the first table.
/// Even positions hold the labels, odd positions the values.
const META_DISTRICT: usize = 1;
const META_LOCAL_BODY: usize = 3;
const META_WARD: usize = 5;
const META_POLLING_STATION: usize = 7;

/// Voter rows carry exactly these columns, in order:
/// serial, name, guardian, house no, house name, "gender/age", id.
const VOTER_COLUMNS: usize = 7;

/// Result of extracting one roll document.
#[derive(Debug, Clone)]
pub struct ExtractReport {
    /// The extracted unit, voters in document order.
    pub ward: WardRecord,
    /// Data rows dropped for a non-numeric serial.
    pub skipped_rows: usize,
}

/// Extract a [`WardRecord`] from one HTML roll document.
///
/// Rows with fewer than [`VOTER_COLUMNS`] cells are header/separator rows
/// and are skipped without comment. Rows whose serial cell is not a number
/// are skipped with a warning and counted in the report. Serials are
/// otherwise taken as-is: out-of-order or duplicate values are logged but
/// never dropped, deduplicated, or re-sorted.
#[instrument(skip(html))]
pub fn extract_ward(html: &str) -> Result<ExtractReport> {
    let doc = Html::parse_document(html);

    let (district, local_body, ward, polling_station) = extract_metadata(&doc)?;

    let body_sel = Selector::parse("tbody.voters-list").unwrap();
    let tr_sel = Selector::parse("tr").unwrap();

    let body = doc
        .select(&body_sel)
        .next()
        .ok_or_else(|| RollcallError::parse("no voters-list table body in document"))?;

    let mut voters = Vec::new();
    let mut skipped_rows = 0usize;
    let mut max_serial: Option<u32> = None;

    for row in body.select(&tr_sel) {
        let Some(voter) = extract_row(&row, &mut skipped_rows) else {
            continue;
        };

        if let Some(max) = max_serial {
            if voter.serial <= max {
                warn!(serial = voter.serial, "serial out of order or duplicated");
            }
        }
        max_serial = Some(max_serial.map_or(voter.serial, |m| m.max(voter.serial)));

        voters.push(voter);
    }

    debug!(
        voters = voters.len(),
        skipped = skipped_rows,
        ward = %ward,
        "extraction complete"
    );

    Ok(ExtractReport {
        ward: WardRecord {
            district,
            local_body,
            ward,
            polling_station,
            voters,
        },
        skipped_rows,
    })
}

/// Read the four header values from the first table's flattened cell list.
fn extract_metadata(doc: &Html) -> Result<(String, String, String, String)> {
    let table_sel = Selector::parse("table").unwrap();
    let td_sel = Selector::parse("td").unwrap();

    let table = doc
        .select(&table_sel)
        .next()
        .ok_or_else(|| RollcallError::parse("no metadata table in document"))?;

    let cells: Vec<String> = table.select(&td_sel).map(|c| cell_text(&c)).collect();

    if cells.len() <= META_POLLING_STATION {
        return Err(RollcallError::parse(format!(
            "metadata table has {} cells, expected at least {}",
            cells.len(),
            META_POLLING_STATION + 1
        )));
    }

    Ok((
        cells[META_DISTRICT].clone(),
        cells[META_LOCAL_BODY].clone(),
        cells[META_WARD].clone(),
        cells[META_POLLING_STATION].clone(),
    ))
}

/// Turn one `<tr>` into a voter, or `None` for non-data and dropped rows.
fn extract_row(row: &ElementRef, skipped_rows: &mut usize) -> Option<VoterRecord> {
    let td_sel = Selector::parse("td").unwrap();
    let cells: Vec<String> = row.select(&td_sel).map(|c| cell_text(&c)).collect();

    // Header and separator rows come through with fewer cells; not a failure.
    if cells.len() < VOTER_COLUMNS {
        return None;
    }

    let serial = match cells[0].parse::<u32>() {
        Ok(serial) => serial,
        Err(_) => {
            warn!(serial = %cells[0], "skipping row with non-numeric serial");
            *skipped_rows += 1;
            return None;
        }
    };

    let (gender, age_token) = split_gender_age(&cells[5]);

    Some(VoterRecord {
        serial,
        name: cells[1].clone(),
        guardian: cells[2].clone(),
        house_no: cells[3].clone(),
        house_name: cells[4].clone(),
        gender,
        age: Age::parse(&age_token),
        id: cells[6].clone(),
        embedding: None,
    })
}

/// Split the combined "gender/age" cell into its halves.
/// A missing half yields an empty string, never an error.
fn split_gender_age(cell: &str) -> (String, String) {
    let mut parts = cell.splitn(2, '/');
    let gender = parts.next().unwrap_or("").trim().to_string();
    let age = parts.next().unwrap_or("").trim().to_string();
    (gender, age)
}

/// Collected, trimmed text content of a table cell.
fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn load_fixture(name: &str) -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/html")
            .join(name);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}"))
    }

    /// Wrap voter rows in a minimal document with a valid metadata table.
    fn doc_with_rows(rows: &str) -> String {
        format!(
            r#"<html><body>
            <table>
              <tr><td>District</td><td>Ernakulam</td><td>Local Body</td><td>Kochi Corporation</td></tr>
              <tr><td>Ward</td><td>Ward 3</td><td>Polling Station</td><td>Govt HS Fort Kochi</td></tr>
            </table>
            <table><tbody class="voters-list">{rows}</tbody></table>
            </body></html>"#
        )
    }

    #[test]
    fn extracts_metadata_from_first_table() {
        let report = extract_ward(&doc_with_rows("")).unwrap();
        assert_eq!(report.ward.district, "Ernakulam");
        assert_eq!(report.ward.local_body, "Kochi Corporation");
        assert_eq!(report.ward.ward, "Ward 3");
        assert_eq!(report.ward.polling_station, "Govt HS Fort Kochi");
        assert!(report.ward.voters.is_empty());
    }

    #[test]
    fn extracts_example_row() {
        let html = doc_with_rows(
            "<tr><td>1</td><td>Jane Doe</td><td>John Doe</td><td>12</td>\
             <td>Oak House</td><td>F/34</td><td>ABC1234567</td></tr>",
        );
        let report = extract_ward(&html).unwrap();
        assert_eq!(report.ward.voters.len(), 1);

        let v = &report.ward.voters[0];
        assert_eq!(v.serial, 1);
        assert_eq!(v.name, "Jane Doe");
        assert_eq!(v.guardian, "John Doe");
        assert_eq!(v.house_no, "12");
        assert_eq!(v.house_name, "Oak House");
        assert_eq!(v.gender, "F");
        assert_eq!(v.age, Age::Years(34));
        assert_eq!(v.id, "ABC1234567");
        assert!(v.embedding.is_none());
    }

    #[test]
    fn trims_whitespace_in_cells() {
        let html = doc_with_rows(
            "<tr><td> 1 </td><td>  Jane Doe\n</td><td>John Doe</td><td>12</td>\
             <td>Oak House</td><td> F / 34 </td><td> ABC1234567 </td></tr>",
        );
        let v = &extract_ward(&html).unwrap().ward.voters[0];
        assert_eq!(v.name, "Jane Doe");
        assert_eq!(v.gender, "F");
        assert_eq!(v.age, Age::Years(34));
        assert_eq!(v.id, "ABC1234567");
    }

    #[test]
    fn short_rows_are_skipped_without_counting() {
        let html = doc_with_rows(
            "<tr><td>1</td><td>A</td><td>B</td><td>1</td><td>H</td><td>F/20</td><td>X1</td></tr>\
             <tr><td colspan=\"7\">page break</td></tr>\
             <tr><td>2</td><td>C</td><td>D</td><td>2</td><td>H</td><td>M/30</td><td>X2</td></tr>",
        );
        let report = extract_ward(&html).unwrap();
        assert_eq!(report.ward.voters.len(), 2);
        assert_eq!(report.skipped_rows, 0);
    }

    #[test]
    fn non_numeric_serial_skips_row_and_counts() {
        let html = doc_with_rows(
            "<tr><td>1</td><td>A</td><td>B</td><td>1</td><td>H</td><td>F/20</td><td>X1</td></tr>\
             <tr><td>two</td><td>C</td><td>D</td><td>2</td><td>H</td><td>M/30</td><td>X2</td></tr>\
             <tr><td>3</td><td>E</td><td>F</td><td>3</td><td>H</td><td>F/40</td><td>X3</td></tr>",
        );
        let report = extract_ward(&html).unwrap();
        assert_eq!(report.ward.voters.len(), 2);
        assert_eq!(report.skipped_rows, 1);
        let serials: Vec<u32> = report.ward.voters.iter().map(|v| v.serial).collect();
        assert_eq!(serials, vec![1, 3]);
    }

    #[test]
    fn gender_age_cell_without_slash_keeps_age_raw() {
        let html = doc_with_rows(
            "<tr><td>1</td><td>A</td><td>B</td><td>1</td><td>H</td><td>F</td><td>X1</td></tr>",
        );
        let v = &extract_ward(&html).unwrap().ward.voters[0];
        assert_eq!(v.gender, "F");
        assert_eq!(v.age, Age::Raw(String::new()));
    }

    #[test]
    fn non_numeric_age_token_is_preserved() {
        let html = doc_with_rows(
            "<tr><td>1</td><td>A</td><td>B</td><td>1</td><td>H</td><td>M/seventy</td><td>X1</td></tr>",
        );
        let v = &extract_ward(&html).unwrap().ward.voters[0];
        assert_eq!(v.gender, "M");
        assert_eq!(v.age, Age::Raw("seventy".into()));
    }

    #[test]
    fn empty_gender_age_cell_yields_empty_halves() {
        let html = doc_with_rows(
            "<tr><td>1</td><td>A</td><td>B</td><td>1</td><td>H</td><td></td><td>X1</td></tr>",
        );
        let v = &extract_ward(&html).unwrap().ward.voters[0];
        assert_eq!(v.gender, "");
        assert_eq!(v.age, Age::Raw(String::new()));
    }

    #[test]
    fn voters_keep_document_order() {
        let html = doc_with_rows(
            "<tr><td>5</td><td>A</td><td>B</td><td>1</td><td>H</td><td>F/20</td><td>X5</td></tr>\
             <tr><td>2</td><td>C</td><td>D</td><td>2</td><td>H</td><td>M/30</td><td>X2</td></tr>\
             <tr><td>2</td><td>E</td><td>F</td><td>3</td><td>H</td><td>F/40</td><td>X9</td></tr>",
        );
        // Out-of-order and duplicate serials are warned about but kept as-is.
        let report = extract_ward(&html).unwrap();
        let serials: Vec<u32> = report.ward.voters.iter().map(|v| v.serial).collect();
        assert_eq!(serials, vec![5, 2, 2]);
    }

    #[test]
    fn missing_metadata_table_is_fatal() {
        let err = extract_ward("<html><body><p>empty</p></body></html>").unwrap_err();
        assert!(matches!(err, RollcallError::Parse { .. }));
        assert!(err.to_string().contains("no metadata table"));
    }

    #[test]
    fn metadata_cell_shortfall_is_fatal() {
        let html = r#"<html><body>
            <table><tr><td>District</td><td>Ernakulam</td></tr></table>
            <table><tbody class="voters-list"></tbody></table>
        </body></html>"#;
        let err = extract_ward(html).unwrap_err();
        assert!(matches!(err, RollcallError::Parse { .. }));
        assert!(err.to_string().contains("expected at least 8"));
    }

    #[test]
    fn missing_voters_list_body_is_fatal() {
        let html = r#"<html><body>
            <table>
              <tr><td>District</td><td>Ernakulam</td><td>Local Body</td><td>Kochi</td></tr>
              <tr><td>Ward</td><td>3</td><td>Station</td><td>School</td></tr>
            </table>
            <table><tbody><tr><td>1</td></tr></tbody></table>
        </body></html>"#;
        let err = extract_ward(html).unwrap_err();
        assert!(matches!(err, RollcallError::Parse { .. }));
        assert!(err.to_string().contains("voters-list"));
    }

    #[test]
    fn extracts_ward_roll_fixture() {
        let html = load_fixture("ward_roll.html");
        let report = extract_ward(&html).unwrap();

        assert_eq!(report.ward.district, "Ernakulam");
        assert_eq!(report.ward.local_body, "Kochi Corporation");
        assert_eq!(report.ward.ward, "Ward 3 - Fort Kochi");
        assert_eq!(report.ward.polling_station, "Govt High School Fort Kochi");

        assert_eq!(report.ward.voters.len(), 4);
        assert_eq!(report.skipped_rows, 1);

        let serials: Vec<u32> = report.ward.voters.iter().map(|v| v.serial).collect();
        assert_eq!(serials, vec![1, 2, 3, 4]);

        // Guardian-less voter keeps an empty guardian, not an error.
        assert_eq!(report.ward.voters[2].guardian, "");
        assert_eq!(report.ward.voters[2].age, Age::Raw(String::new()));
        assert_eq!(report.ward.voters[3].age, Age::Raw("seventy".into()));
    }

    #[test]
    fn extraction_matches_serialized_fixture() {
        let html = load_fixture("ward_roll.html");
        let report = extract_ward(&html).unwrap();

        let fixture = std::fs::read_to_string(
            std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("../../../fixtures/json/3_english.json"),
        )
        .expect("read json fixture");
        let expected: WardRecord = serde_json::from_str(&fixture).expect("parse json fixture");

        assert_eq!(report.ward, expected);
    }
}
