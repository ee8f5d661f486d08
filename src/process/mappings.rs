//! Static lookup tables that collapse detailed labels into coarser categories.

use std::collections::BTreeSet;

use tracing::warn;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `"Jan"` → 1 … `"Dec"` → 12. Case-insensitive; anything else is `None`.
pub fn month_number(abbrev: &str) -> Option<u32> {
    let abbrev = abbrev.trim();
    MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(abbrev))
        .map(|i| i as u32 + 1)
}

/// Outcome of a category lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Mapped(&'static str),
    Unmapped(&'a str),
}

impl<'a> Lookup<'a> {
    pub fn mapped(self) -> Option<&'static str> {
        match self {
            Lookup::Mapped(c) => Some(c),
            Lookup::Unmapped(_) => None,
        }
    }
}

/// Immutable detail → category table.
#[derive(Debug)]
pub struct CategoryMap {
    pub name: &'static str,
    entries: &'static [(&'static str, &'static str)],
}

impl CategoryMap {
    pub const fn new(name: &'static str, entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { name, entries }
    }

    pub fn lookup<'a>(&self, input: &'a str) -> Lookup<'a> {
        let needle = input.trim();
        self.entries
            .iter()
            .find(|(detail, _)| detail.eq_ignore_ascii_case(needle))
            .map(|(_, category)| Lookup::Mapped(*category))
            .unwrap_or(Lookup::Unmapped(input))
    }

    /// Distinct categories in table order.
    pub fn categories(&self) -> Vec<&'static str> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .filter(|(_, c)| seen.insert(*c))
            .map(|(_, c)| *c)
            .collect()
    }

    /// Maps every input, warning once per distinct unmapped value.
    pub fn map_all<'a, I>(&self, inputs: I) -> Vec<Lookup<'a>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut warned = BTreeSet::new();
        inputs
            .into_iter()
            .map(|input| {
                let out = self.lookup(input);
                if let Lookup::Unmapped(value) = out {
                    if warned.insert(value) {
                        warn!(map = self.name, value, "unmapped category value");
                    }
                }
                out
            })
            .collect()
    }
}

pub const MIDWEST: &str = "Midwest Region";
pub const NORTHEAST: &str = "Northeast Region";
pub const SOUTH: &str = "South Region";
pub const WEST: &str = "West Region";

pub const CENSUS_REGIONS: [&str; 4] = [NORTHEAST, MIDWEST, SOUTH, WEST];

/// US state → census region.
pub static US_REGIONS: CategoryMap = CategoryMap::new(
    "us_region",
    &[
        ("Iowa", MIDWEST),
        ("Illinois", MIDWEST),
        ("Indiana", MIDWEST),
        ("Kansas", MIDWEST),
        ("Michigan", MIDWEST),
        ("Minnesota", MIDWEST),
        ("Missouri", MIDWEST),
        ("North Dakota", MIDWEST),
        ("Nebraska", MIDWEST),
        ("Ohio", MIDWEST),
        ("South Dakota", MIDWEST),
        ("Wisconsin", MIDWEST),
        ("Connecticut", NORTHEAST),
        ("Massachusetts", NORTHEAST),
        ("Maine", NORTHEAST),
        ("New Hampshire", NORTHEAST),
        ("New Jersey", NORTHEAST),
        ("New York", NORTHEAST),
        ("Pennsylvania", NORTHEAST),
        ("Rhode Island", NORTHEAST),
        ("Vermont", NORTHEAST),
        ("Alabama", SOUTH),
        ("Arkansas", SOUTH),
        ("District of Columbia", SOUTH),
        ("Delaware", SOUTH),
        ("Florida", SOUTH),
        ("Georgia", SOUTH),
        ("Kentucky", SOUTH),
        ("Louisiana", SOUTH),
        ("Maryland", SOUTH),
        ("Mississippi", SOUTH),
        ("North Carolina", SOUTH),
        ("Oklahoma", SOUTH),
        ("South Carolina", SOUTH),
        ("Tennessee", SOUTH),
        ("Texas", SOUTH),
        ("Virginia", SOUTH),
        ("West Virginia", SOUTH),
        ("Alaska", WEST),
        ("Arizona", WEST),
        ("California", WEST),
        ("Colorado", WEST),
        ("Hawaii", WEST),
        ("Idaho", WEST),
        ("Montana", WEST),
        ("New Mexico", WEST),
        ("Nevada", WEST),
        ("Oregon", WEST),
        ("Utah", WEST),
        ("Washington", WEST),
        ("Wyoming", WEST),
    ],
);

pub fn assign_region(state: &str) -> Lookup<'_> {
    US_REGIONS.lookup(state)
}

/// ISCED 2011 levels (labels and codes) → six generic attainment buckets.
pub static EDUCATION_LEVELS: CategoryMap = CategoryMap::new(
    "education_level",
    &[
        ("Early childhood education", "Less than primary"),
        ("Less than primary education", "Less than primary"),
        ("ISCED 0", "Less than primary"),
        ("Primary education", "Primary"),
        ("ISCED 1", "Primary"),
        ("Lower secondary education", "Lower secondary"),
        ("ISCED 2", "Lower secondary"),
        ("Upper secondary education", "Upper secondary"),
        ("ISCED 3", "Upper secondary"),
        ("Post-secondary non-tertiary education", "Post-secondary non-tertiary"),
        ("ISCED 4", "Post-secondary non-tertiary"),
        ("Short-cycle tertiary education", "Tertiary"),
        ("Bachelor's or equivalent level", "Tertiary"),
        ("Master's or equivalent level", "Tertiary"),
        ("Doctoral or equivalent level", "Tertiary"),
        ("ISCED 5", "Tertiary"),
        ("ISCED 6", "Tertiary"),
        ("ISCED 7", "Tertiary"),
        ("ISCED 8", "Tertiary"),
    ],
);

/// Detailed race/ethnicity labels from the CPS tables → canonical groups.
pub static ETHNICITY_GROUPS: CategoryMap = CategoryMap::new(
    "ethnicity",
    &[
        ("White", "White"),
        ("White alone", "White"),
        ("Black or African American", "Black"),
        ("Black or African American alone", "Black"),
        ("Black", "Black"),
        ("Asian", "Asian"),
        ("Asian alone", "Asian"),
        ("Hispanic or Latino", "Hispanic"),
        ("Hispanic or Latino ethnicity", "Hispanic"),
        ("Hispanic", "Hispanic"),
        ("American Indian and Alaska Native", "Other"),
        ("Native Hawaiian and Other Pacific Islander", "Other"),
        ("Two or more races", "Other"),
    ],
);
