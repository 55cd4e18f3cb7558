use chrono::{Datelike, NaiveDate};

/// Active listing filters. Empty fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilters {
    /// Case-insensitive substring match on the truck number
    pub truck_number: Option<String>,
    /// Inclusive lower bound on the document date
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the document date
    pub date_to: Option<NaiveDate>,
}

/// April-to-March financial year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinancialYear {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FinancialYear {
    /// Financial year starting on April 1 of `start_year`
    pub fn starting(start_year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(start_year, 4, 1)?,
            end: NaiveDate::from_ymd_opt(start_year + 1, 3, 31)?,
        })
    }

    pub fn containing(day: NaiveDate) -> Option<Self> {
        let start_year = if day.month() >= 4 { day.year() } else { day.year() - 1 };
        Self::starting(start_year)
    }

    pub fn previous(&self) -> Option<Self> {
        Self::starting(self.start.year() - 1)
    }

    pub fn label(&self) -> String {
        format!("FY {}-{}", self.start.year(), self.end.year())
    }
}

impl DocumentFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_truck_number(mut self, truck_number: impl Into<String>) -> Self {
        let truck_number = truck_number.into();
        self.truck_number = if truck_number.trim().is_empty() {
            None
        } else {
            Some(truck_number)
        };
        self
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// Date range of the financial year containing `today`; truck filter cleared
    pub fn current_financial_year(today: NaiveDate) -> Self {
        Self::for_financial_year(FinancialYear::containing(today))
    }

    /// Date range of the financial year before the one containing `today`
    pub fn last_financial_year(today: NaiveDate) -> Self {
        Self::for_financial_year(FinancialYear::containing(today).and_then(|fy| fy.previous()))
    }

    fn for_financial_year(fy: Option<FinancialYear>) -> Self {
        match fy {
            Some(fy) => Self::new().with_date_range(Some(fy.start), Some(fy.end)),
            None => Self::new(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.truck_number.is_none() && self.date_from.is_none() && self.date_to.is_none()
    }

    pub fn has_date_range(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some()
    }

    /// Query parameters in the order the listing endpoint documents them
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(truck) = &self.truck_number {
            pairs.push(("truck_number", truck.clone()));
        }
        if let Some(from) = self.date_from {
            pairs.push(("date_from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.date_to {
            pairs.push(("date_to", to.format("%Y-%m-%d").to_string()));
        }
        pairs
    }
}
