//! Search keywords. `<Field><op><value>` tokens with a known field become
//! relational predicates on the record; everything else is free text
//! matched against the grouping key.

use log::warn;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::record::ExecutionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Walltime,
    Usertime,
    Systemtime,
    Exitcode,
    Signals,
}

impl Field {
    const ALL: [Field; 5] = [
        Field::Walltime,
        Field::Usertime,
        Field::Systemtime,
        Field::Exitcode,
        Field::Signals,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Walltime => "Walltime",
            Field::Usertime => "Usertime",
            Field::Systemtime => "Systemtime",
            Field::Exitcode => "Exitcode",
            Field::Signals => "Signals",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    fn parse_operand(self, value: &str) -> Result<Operand> {
        match self {
            Field::Walltime | Field::Usertime | Field::Systemtime => parse_duration(value)
                .map(Operand::Duration)
                .ok_or_else(|| Error::KeywordValueParse {
                    value: value.to_string(),
                    expected: "a duration",
                }),
            Field::Exitcode | Field::Signals => value
                .parse()
                .map(Operand::Integer)
                .map_err(|_| Error::KeywordValueParse {
                    value: value.to_string(),
                    expected: "an integer",
                }),
        }
    }

    fn measure(self, record: &ExecutionRecord) -> Operand {
        match self {
            Field::Walltime => Operand::Duration(record.wall),
            Field::Usertime => Operand::Duration(record.user),
            Field::Systemtime => Operand::Duration(record.system),
            Field::Exitcode => Operand::Integer(i64::from(record.exit_code)),
            Field::Signals => Operand::Integer(record.signal_count()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Less,
    Equal,
    Greater,
}

impl Relation {
    fn from_operator(op: char) -> Option<Self> {
        match op {
            '<' => Some(Relation::Less),
            '=' => Some(Relation::Equal),
            '>' => Some(Relation::Greater),
            _ => None,
        }
    }

    fn operator(self) -> char {
        match self {
            Relation::Less => '<',
            Relation::Equal => '=',
            Relation::Greater => '>',
        }
    }

    fn holds<T: Ord>(self, stored: T, wanted: T) -> bool {
        match self {
            Relation::Less => stored < wanted,
            Relation::Equal => stored == wanted,
            Relation::Greater => stored > wanted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Duration(Duration),
    Integer(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalKeyword {
    pub field: Field,
    pub relation: Relation,
    pub value: Operand,
}

impl RelationalKeyword {
    /// `Ok(None)` when the token is not shaped like a known relational
    /// keyword; `Err` when the field is known but the value does not parse.
    pub fn parse(token: &str) -> Result<Option<Self>> {
        let Some(at) = token.find(['<', '=', '>']) else {
            return Ok(None);
        };
        let Some(field) = Field::from_name(&token[..at]) else {
            return Ok(None);
        };
        let relation = token[at..]
            .chars()
            .next()
            .and_then(Relation::from_operator);
        let Some(relation) = relation else {
            return Ok(None);
        };
        let value = field.parse_operand(&token[at + 1..])?;
        Ok(Some(Self {
            field,
            relation,
            value,
        }))
    }

    pub fn matches(&self, record: &ExecutionRecord) -> bool {
        match (self.field.measure(record), self.value) {
            (Operand::Duration(stored), Operand::Duration(wanted)) => {
                self.relation.holds(stored, wanted)
            }
            (Operand::Integer(stored), Operand::Integer(wanted)) => {
                self.relation.holds(stored, wanted)
            }
            _ => false,
        }
    }
}

impl fmt::Display for RelationalKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.field.name(), self.relation.operator())?;
        match self.value {
            Operand::Duration(d) => write!(f, "{d:?}"),
            Operand::Integer(i) => write!(f, "{i}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    Text(String),
    Relational(RelationalKeyword),
}

impl Keyword {
    /// Classifies one token. A known field with a bad value is logged and
    /// kept as text.
    pub fn parse(token: &str) -> Self {
        match RelationalKeyword::parse(token) {
            Ok(Some(relational)) => Keyword::Relational(relational),
            Ok(None) => Keyword::Text(token.to_string()),
            Err(err) => {
                warn!("{err}, searching for {token:?} as text");
                Keyword::Text(token.to_string())
            }
        }
    }
}

/// Classified search keywords. All of them must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    pub text: Vec<String>,
    pub relational: Vec<RelationalKeyword>,
}

impl KeywordSet {
    pub fn classify<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut set = Self::default();
        for token in tokens {
            match Keyword::parse(token.as_ref()) {
                Keyword::Text(text) => set.text.push(text),
                Keyword::Relational(relational) => set.relational.push(relational),
            }
        }
        set
    }

    pub fn matches_text(&self, grouping_key: &str) -> bool {
        self.text.iter().all(|t| grouping_key.contains(t.as_str()))
    }

    pub fn matches_record(&self, record: &ExecutionRecord) -> bool {
        self.relational.iter().all(|k| k.matches(record))
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.relational.is_empty()
    }
}

const MAX_FRACTION_DIGITS: usize = 18;

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60_000_000_000,
        "h" => 3_600_000_000_000,
        _ => return None,
    })
}

/// Parses durations written like `1h2m3.5s`, `250ms` or `0`. Negative
/// durations are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.strip_prefix('+').unwrap_or(s);
    if s == "0" {
        return Some(Duration::ZERO);
    }
    if s.is_empty() {
        return None;
    }

    let mut rest = s;
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(num_len);
        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return None;
        }

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let scale = unit_nanos(unit)?;

        let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut part = whole.checked_mul(scale)?;
        if !fraction.is_empty() {
            let digits = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
            let numerator: u128 = digits.parse().ok()?;
            let fractional = numerator.checked_mul(scale)? / 10u128.pow(digits.len() as u32);
            part = part.checked_add(fractional)?;
        }
        total = total.checked_add(part)?;
        rest = next;
    }

    u64::try_from(total).ok().map(Duration::from_nanos)
}
