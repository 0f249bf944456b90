//! This module stores the column names of the canonical long-format observation table and of the
//! work columns produced while interpolating. Note that these must be synchronised with the
//! column names used by the downstream publishing jobs!

pub const SOURCE: &str = "source";
pub const SERIES_ID: &str = "series_id";
pub const SERIES_NAME: &str = "series_name";
pub const ALPHA_3_CODE: &str = "alpha_3_code";
pub const YEAR: &str = "year";
pub const VALUE: &str = "value";

/// Prefix of the columns holding disaggregation dimensions, e.g. `disagr_sex`.
pub const DIMENSION_PREFIX: &str = "disagr_";
/// Prefix of the columns holding series properties, e.g. `prop_unit`.
pub const PROPERTY_PREFIX: &str = "prop_";

pub const PROP_UNIT: &str = "prop_unit";
pub const PROP_OBSERVATION_TYPE: &str = "prop_observation_type";
pub const PROP_VALUE_LABEL: &str = "prop_value_label";

pub const GAPPINESS_INDEX: &str = "gappiness_index";
pub const OBSERVED_YEARS: &str = "observed_years";
pub const MISSING_YEARS: &str = "missing_years";
pub const YEAR_MIN: &str = "year_min";
pub const YEAR_MAX: &str = "year_max";
