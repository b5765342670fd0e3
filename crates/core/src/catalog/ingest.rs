//! Catalog upload parsing. Columns are resolved by header name, not position.

use std::borrow::Cow;
use std::io::Read;

use csv::{ReaderBuilder, Trim};

use super::{parse_price, CatalogRow};
use crate::domain::product::ProductCode;
use crate::errors::SubstitutionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogColumn {
    Code,
    Label,
    Market,
    Segment,
    Category,
    Family,
    Price,
    Origin,
    Premium,
}

impl CatalogColumn {
    pub const ALL: [CatalogColumn; 9] = [
        CatalogColumn::Code,
        CatalogColumn::Label,
        CatalogColumn::Market,
        CatalogColumn::Segment,
        CatalogColumn::Category,
        CatalogColumn::Family,
        CatalogColumn::Price,
        CatalogColumn::Origin,
        CatalogColumn::Premium,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CatalogColumn::Code => "code",
            CatalogColumn::Label => "label",
            CatalogColumn::Market => "market",
            CatalogColumn::Segment => "segment",
            CatalogColumn::Category => "category",
            CatalogColumn::Family => "family",
            CatalogColumn::Price => "price",
            CatalogColumn::Origin => "origin",
            CatalogColumn::Premium => "premium",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            CatalogColumn::Code => &["code", "product_code", "product_id"],
            CatalogColumn::Label => &["label", "name", "description", "text"],
            CatalogColumn::Market => &["market"],
            CatalogColumn::Segment => &["segment"],
            CatalogColumn::Category => &["category"],
            CatalogColumn::Family => &["family"],
            CatalogColumn::Price => &["price"],
            CatalogColumn::Origin => &["origin"],
            CatalogColumn::Premium => &["premium"],
        }
    }

    fn matches(self, header: &str) -> bool {
        let normalized = normalize_header(header);
        self.aliases().iter().any(|alias| *alias == normalized)
    }
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_ascii_lowercase()
        .split(|ch: char| ch.is_whitespace() || ch == '-' || ch == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Position of each [`CatalogColumn`] within an upload's records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMap {
    positions: [usize; 9],
}

impl ColumnMap {
    /// The fixed `code, label, market, segment, category, family, price, origin, premium` order.
    pub fn positional() -> Self {
        Self { positions: [0, 1, 2, 3, 4, 5, 6, 7, 8] }
    }

    pub fn from_headers<I, S>(headers: I) -> Result<Self, SubstitutionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers: Vec<String> = headers.into_iter().map(|h| h.as_ref().to_owned()).collect();
        let mut positions = [0usize; 9];

        for (slot, column) in CatalogColumn::ALL.iter().enumerate() {
            positions[slot] = headers
                .iter()
                .position(|header| column.matches(header))
                .ok_or_else(|| {
                    SubstitutionError::format(
                        0,
                        format!("missing required column `{}`", column.name()),
                    )
                })?;
        }

        Ok(Self { positions })
    }

    /// Like [`ColumnMap::from_headers`], except that a header row naming none of the known
    /// columns is read as a caption row and the positional order applies.
    pub fn resolve<I, S>(headers: I) -> Result<Self, SubstitutionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers: Vec<String> = headers.into_iter().map(|h| h.as_ref().to_owned()).collect();
        let recognized = headers
            .iter()
            .any(|header| CatalogColumn::ALL.iter().any(|column| column.matches(header)));
        if recognized {
            Self::from_headers(headers)
        } else {
            Ok(Self::positional())
        }
    }

    pub fn position(&self, column: CatalogColumn) -> usize {
        self.positions[column as usize]
    }

    fn width(&self) -> usize {
        self.positions.iter().copied().max().unwrap_or(0) + 1
    }

    pub(crate) fn project<S: AsRef<str>>(
        &self,
        row: usize,
        cells: &[S],
        decimal_comma: bool,
    ) -> Result<CatalogRow, SubstitutionError> {
        if cells.len() < self.width() {
            return Err(SubstitutionError::format(
                row,
                format!("expected at least {} fields, found {}", self.width(), cells.len()),
            ));
        }

        let cell = |column: CatalogColumn| cells[self.position(column)].as_ref().trim();
        let price = cell(CatalogColumn::Price);
        let price = if decimal_comma { normalize_decimal_comma(price) } else { Cow::Borrowed(price) };

        Ok(CatalogRow {
            code: ProductCode::from(cell(CatalogColumn::Code)),
            label: cell(CatalogColumn::Label).to_owned(),
            market: cell(CatalogColumn::Market).to_owned(),
            segment: cell(CatalogColumn::Segment).to_owned(),
            category: cell(CatalogColumn::Category).to_owned(),
            family: cell(CatalogColumn::Family).to_owned(),
            price: parse_price(row, &price)?,
            origin: cell(CatalogColumn::Origin).to_owned(),
            premium: cell(CatalogColumn::Premium).to_owned(),
        })
    }
}

/// `4,5` → `4.5`. Values with a dot or several commas are left alone.
fn normalize_decimal_comma(raw: &str) -> Cow<'_, str> {
    if !raw.contains('.') && raw.matches(',').count() == 1 {
        Cow::Owned(raw.replacen(',', ".", 1))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Reads delimited catalog exports. By default the first record is a header naming the
/// columns; headerless exports fall back to the positional column order.
#[derive(Clone, Debug)]
pub struct CatalogParser {
    delimiter: u8,
    headerless: bool,
    decimal_comma: bool,
}

impl Default for CatalogParser {
    fn default() -> Self {
        Self { delimiter: b',', headerless: false, decimal_comma: false }
    }
}

impl CatalogParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delimiter; prices are read with a decimal comma unless it is `,`.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self.decimal_comma = delimiter != b',';
        self
    }

    pub fn headerless(mut self) -> Self {
        self.headerless = true;
        self
    }

    /// Picks `;` or tab over `,` when the header line uses it more often, as spreadsheet
    /// exports in many locales do. Those locales also write decimal commas, so prices are
    /// read that way whenever the delimiter is not `,`.
    pub fn sniff(input: &str) -> Self {
        let header = input.lines().next().unwrap_or_default();
        let count = |needle: char| header.matches(needle).count();
        let delimiter = [(b',', count(',')), (b';', count(';')), (b'\t', count('\t'))]
            .into_iter()
            .max_by_key(|(_, occurrences)| *occurrences)
            .filter(|(_, occurrences)| *occurrences > 0)
            .map(|(delimiter, _)| delimiter)
            .unwrap_or(b',');
        Self { delimiter, headerless: false, decimal_comma: delimiter != b',' }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn parse_str(&self, input: &str) -> Result<Vec<CatalogRow>, SubstitutionError> {
        self.parse_reader(input.as_bytes())
    }

    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<Vec<CatalogRow>, SubstitutionError> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(!self.headerless)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let columns = if self.headerless {
            ColumnMap::positional()
        } else {
            let headers = reader.headers().map_err(|error| {
                SubstitutionError::format(0, format!("unreadable header: {error}"))
            })?;
            ColumnMap::resolve(headers.iter())?
        };

        let mut rows = Vec::new();
        for (offset, record) in reader.records().enumerate() {
            let row = offset + 1;
            let record = record.map_err(|error| SubstitutionError::format(row, error.to_string()))?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            let cells: Vec<&str> = record.iter().collect();
            rows.push(columns.project(row, &cells, self.decimal_comma)?);
        }

        Ok(rows)
    }
}
