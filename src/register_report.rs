//! Parser for the eGauge register report (`/cgi-bin/egauge?inst&tot`).
//!
//! ```xml
//! <data serial="0x3b8c1a2e">
//!   <ts>1697040000</ts>
//!   <r t="P" n="Solar" did="0"><v>123456789</v><i>1234</i></r>
//!   <r t="P" n="Dryer" did="1"><v>987654</v><i>0.2</i></r>
//! </data>
//! ```
//!
//! `n` names the register, the first `i` is the instantaneous reading and the
//! first `v` is the cumulative total. A single malformed register fails the
//! whole report.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterRecord {
    /// Name exactly as reported by the device.
    pub name: String,
    /// Register type code (`P` for power, `V` for voltage, ...), when present.
    pub kind: Option<String>,
    pub instantaneous: f64,
    /// Text of the first `i` element as sent, used as the published payload.
    pub raw_instantaneous: String,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
enum ValueField {
    Instantaneous,
    Total,
}

#[derive(Debug, Default)]
struct RawRegister {
    index: usize,
    attribute_count: usize,
    name: Option<String>,
    kind: Option<String>,
    instantaneous: Vec<String>,
    totals: Vec<String>,
}

impl RawRegister {
    fn from_start(start: &BytesStart, index: usize) -> Result<Self, ParseError> {
        let mut raw = RawRegister {
            index,
            ..Default::default()
        };
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::Xml(e.to_string()))?;
            let value = attr.unescape_value()?.into_owned();
            raw.attribute_count += 1;
            match attr.key.local_name().as_ref() {
                b"n" => raw.name = Some(value),
                b"t" => raw.kind = Some(value),
                _ => {}
            }
        }
        Ok(raw)
    }

    fn into_record(self) -> Result<RegisterRecord, ParseError> {
        let index = self.index;
        if self.attribute_count == 0 {
            return Err(ParseError::MissingAttributes { index });
        }
        let first = self
            .instantaneous
            .first()
            .ok_or(ParseError::MissingReading { index })?;
        let name = self.name.ok_or(ParseError::MissingName { index })?;

        let instantaneous = parse_value(&name, first)?;
        let total = self
            .totals
            .first()
            .map(|value| parse_value(&name, value))
            .transpose()?;

        Ok(RegisterRecord {
            raw_instantaneous: first.trim().to_string(),
            name,
            kind: self.kind,
            instantaneous,
            total,
        })
    }
}

fn parse_value(register: &str, value: &str) -> Result<f64, ParseError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidReading {
            register: register.to_string(),
            value: value.to_string(),
        })
}

/// Decodes a register report into records, in document order.
///
/// The `data` node may be the document root or a direct child of it.
pub fn parse(body: &str) -> Result<Vec<RegisterRecord>, ParseError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut data_depth: Option<usize> = None;
    let mut saw_data = false;

    let mut raw_registers = Vec::new();
    let mut current: Option<RawRegister> = None;
    let mut field: Option<(ValueField, String)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                open_element(
                    &e,
                    depth,
                    &mut data_depth,
                    &mut saw_data,
                    &mut current,
                    &mut field,
                    raw_registers.len(),
                )?;
            }
            Event::Empty(e) => {
                depth += 1;
                open_element(
                    &e,
                    depth,
                    &mut data_depth,
                    &mut saw_data,
                    &mut current,
                    &mut field,
                    raw_registers.len(),
                )?;
                close_element(
                    depth,
                    &mut data_depth,
                    &mut current,
                    &mut field,
                    &mut raw_registers,
                );
                depth -= 1;
            }
            Event::Text(t) => {
                if let Some((_, buffer)) = field.as_mut() {
                    buffer.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some((_, buffer)) = field.as_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => {
                close_element(
                    depth,
                    &mut data_depth,
                    &mut current,
                    &mut field,
                    &mut raw_registers,
                );
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_data {
        return Err(ParseError::MissingData);
    }
    if raw_registers.is_empty() {
        return Err(ParseError::MissingRegisters);
    }

    raw_registers
        .into_iter()
        .map(RawRegister::into_record)
        .collect()
}

fn open_element(
    e: &BytesStart,
    depth: usize,
    data_depth: &mut Option<usize>,
    saw_data: &mut bool,
    current: &mut Option<RawRegister>,
    field: &mut Option<(ValueField, String)>,
    next_index: usize,
) -> Result<(), ParseError> {
    let name = e.local_name();
    match *data_depth {
        None if !*saw_data && depth <= 2 && name.as_ref() == b"data" => {
            *data_depth = Some(depth);
            *saw_data = true;
        }
        Some(d) if depth == d + 1 && name.as_ref() == b"r" => {
            *current = Some(RawRegister::from_start(e, next_index)?);
        }
        Some(d) if depth == d + 2 && current.is_some() => {
            *field = match name.as_ref() {
                b"i" => Some((ValueField::Instantaneous, String::new())),
                b"v" => Some((ValueField::Total, String::new())),
                _ => None,
            };
        }
        _ => {}
    }
    Ok(())
}

fn close_element(
    depth: usize,
    data_depth: &mut Option<usize>,
    current: &mut Option<RawRegister>,
    field: &mut Option<(ValueField, String)>,
    raw_registers: &mut Vec<RawRegister>,
) {
    let Some(d) = *data_depth else {
        return;
    };
    if depth == d + 2 {
        if let (Some((kind, value)), Some(register)) = (field.take(), current.as_mut()) {
            match kind {
                ValueField::Instantaneous => register.instantaneous.push(value),
                ValueField::Total => register.totals.push(value),
            }
        }
    } else if depth == d + 1 {
        if let Some(register) = current.take() {
            raw_registers.push(register);
        }
    } else if depth == d {
        *data_depth = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<data serial="0x3b8c1a2e">
  <ts>1697040000</ts>
  <r t="P" n="Solar" did="0"><v>123456789</v><i>1234</i></r>
  <r t="P" n="Dryer" did="1"><v>987654</v><i>0.2</i></r>
</data>"#;

    #[test]
    fn test_parse_two_registers_in_order() {
        let records = parse(SAMPLE).unwrap();
        assert_eq!(
            records,
            vec![
                RegisterRecord {
                    name: "Solar".to_string(),
                    kind: Some("P".to_string()),
                    instantaneous: 1234.0,
                    raw_instantaneous: "1234".to_string(),
                    total: Some(123456789.0),
                },
                RegisterRecord {
                    name: "Dryer".to_string(),
                    kind: Some("P".to_string()),
                    instantaneous: 0.2,
                    raw_instantaneous: "0.2".to_string(),
                    total: Some(987654.0),
                },
            ]
        );
    }

    #[test]
    fn test_parse_keeps_raw_name() {
        let body = r#"<data><r n="Solar+Panel #1 &amp; Co"><i>-12.5</i></r></data>"#;
        let records = parse(body).unwrap();
        assert_eq!(records[0].name, "Solar+Panel #1 & Co");
        assert_eq!(records[0].instantaneous, -12.5);
        assert_eq!(records[0].total, None);
        assert_eq!(records[0].kind, None);
    }

    #[test]
    fn test_first_instantaneous_value_wins() {
        let body = r#"<data><r n="Grid"><i>3</i><i>4</i></r></data>"#;
        assert_eq!(parse(body).unwrap()[0].instantaneous, 3.0);
    }

    #[test]
    fn test_reading_text_kept_as_sent() {
        let body = r#"<data><r n="Grid"><i>1234.50</i></r><r n="Solar"><i>1e3</i></r></data>"#;
        let records = parse(body).unwrap();
        assert_eq!(records[0].instantaneous, 1234.5);
        assert_eq!(records[0].raw_instantaneous, "1234.50");
        assert_eq!(records[1].instantaneous, 1000.0);
        assert_eq!(records[1].raw_instantaneous, "1e3");
    }

    #[test]
    fn test_data_as_child_of_root() {
        let body = r#"<egauge><data><r n="Grid"><i>7</i></r></data></egauge>"#;
        let records = parse(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Grid");
    }

    #[test]
    fn test_missing_data_node() {
        let body = r#"<report><r n="Grid"><i>7</i></r></report>"#;
        assert!(matches!(parse(body), Err(ParseError::MissingData)));
        assert!(matches!(parse(""), Err(ParseError::MissingData)));
    }

    #[test]
    fn test_missing_register_collection() {
        let body = r#"<data serial="1"><ts>1697040000</ts></data>"#;
        assert!(matches!(parse(body), Err(ParseError::MissingRegisters)));
        assert!(matches!(parse("<data/>"), Err(ParseError::MissingRegisters)));
    }

    #[test]
    fn test_missing_attributes_discards_batch() {
        let body = r#"<data><r n="Solar"><i>1</i></r><r><i>2</i></r></data>"#;
        assert!(matches!(
            parse(body),
            Err(ParseError::MissingAttributes { index: 1 })
        ));
    }

    #[test]
    fn test_missing_reading_discards_batch() {
        let body = r#"<data><r n="Solar"><v>10</v></r><r n="Dryer"><i>2</i></r></data>"#;
        assert!(matches!(
            parse(body),
            Err(ParseError::MissingReading { index: 0 })
        ));
        let body = r#"<data><r n="Solar"/></data>"#;
        assert!(matches!(
            parse(body),
            Err(ParseError::MissingReading { index: 0 })
        ));
    }

    #[test]
    fn test_missing_name_discards_batch() {
        let body = r#"<data><r t="P" n="Solar"><i>5</i></r><r t="P"><i>2</i></r></data>"#;
        assert!(matches!(
            parse(body),
            Err(ParseError::MissingName { index: 1 })
        ));
    }

    #[test]
    fn test_non_numeric_reading() {
        let body = r#"<data><r n="Solar"><i>abc</i></r></data>"#;
        match parse(body) {
            Err(ParseError::InvalidReading { register, value }) => {
                assert_eq!(register, "Solar");
                assert_eq!(value, "abc");
            }
            other => panic!("expected InvalidReading, got {other:?}"),
        }
        let body = r#"<data><r n="Solar"><i/></r></data>"#;
        assert!(matches!(parse(body), Err(ParseError::InvalidReading { .. })));
        let body = r#"<data><r n="Solar"><i>NaN</i></r></data>"#;
        assert!(matches!(parse(body), Err(ParseError::InvalidReading { .. })));
    }

    #[test]
    fn test_malformed_xml() {
        let body = r#"<data><r n="Solar"><i>1</i></x></data>"#;
        assert!(matches!(parse(body), Err(ParseError::Xml(_))));
    }

    #[test]
    fn test_nested_r_outside_data_ignored() {
        let body = concat!(
            r#"<data><r n="Grid"><i>1</i></r>"#,
            r#"<group><r n="Inner"><i>9</i></r></group></data>"#
        );
        let records = parse(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Grid");
    }
}
