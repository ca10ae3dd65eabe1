//! Function signature table.
//!
//! A read-only, case-insensitive mapping from function name to its declared
//! arity and types. The host treats a table as an immutable snapshot and
//! swaps it atomically between requests.

use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while loading a signature table.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The document is not valid signature JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A signature with an empty name.
    #[error("Invalid signature: function name is empty")]
    EmptyName,

    /// `maxArgs` below `minArgs`.
    #[error("Invalid signature for {name}: maxArgs {max} is less than minArgs {min}")]
    InvalidArity { name: String, min: usize, max: usize },
}

/// Broad grouping of functions, used by the aggregation and performance checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FunctionCategory {
    Aggregate,
    TableCalculation,
    Logical,
    String,
    Number,
    Date,
    TypeConversion,
    User,
    #[default]
    Other,
}

/// Declared signature of one function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSignature {
    pub name: String,
    pub min_args: usize,
    /// `None` means variadic
    #[serde(default)]
    pub max_args: Option<usize>,
    #[serde(default)]
    pub arg_types: Vec<String>,
    #[serde(default = "any_type")]
    pub return_type: String,
    #[serde(default)]
    pub category: FunctionCategory,
}

fn any_type() -> String {
    "any".to_string()
}

impl FunctionSignature {
    pub fn new(
        name: impl Into<String>,
        min_args: usize,
        max_args: Option<usize>,
        category: FunctionCategory,
    ) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
            arg_types: Vec::new(),
            return_type: any_type(),
            category,
        }
    }

    pub fn with_types(mut self, arg_types: &[&str], return_type: &str) -> Self {
        self.arg_types = arg_types.iter().map(|t| t.to_string()).collect();
        self.return_type = return_type.to_string();
        self
    }

    /// Whether a call with `count` arguments matches the declared arity
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.is_none_or(|max| count <= max)
    }

    /// Expected argument count for messages: "1", "2 to 3", "at least 1"
    pub fn expected_description(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.category == FunctionCategory::Aggregate
    }

    pub fn is_table_calculation(&self) -> bool {
        self.category == FunctionCategory::TableCalculation
    }

    fn validate(&self) -> Result<(), SignatureError> {
        if self.name.trim().is_empty() {
            return Err(SignatureError::EmptyName);
        }
        if let Some(max) = self.max_args
            && max < self.min_args
        {
            return Err(SignatureError::InvalidArity {
                name: self.name.clone(),
                min: self.min_args,
                max,
            });
        }
        Ok(())
    }
}

/// Case-insensitive signature lookup table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureTable {
    functions: IndexMap<SmolStr, FunctionSignature>,
}

static BUILTIN: LazyLock<Arc<SignatureTable>> = LazyLock::new(|| Arc::new(SignatureTable::builtin()));

impl SignatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the built-in table
    pub fn shared_builtin() -> Arc<SignatureTable> {
        Arc::clone(&BUILTIN)
    }

    /// Table of the built-in calculation functions
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (name, min, max, category, args, ret) in BUILTIN_FUNCTIONS {
            table.insert(
                FunctionSignature::new(*name, *min, *max, *category).with_types(args, ret),
            );
        }
        table
    }

    /// Load signatures from a JSON array of signature objects
    pub fn from_json_str(json: &str) -> Result<Self, SignatureError> {
        let signatures: Vec<FunctionSignature> = serde_json::from_str(json)?;
        let mut table = Self::new();
        for signature in signatures {
            signature.validate()?;
            table.insert(signature);
        }
        Ok(table)
    }

    /// Add or replace a signature
    pub fn insert(&mut self, signature: FunctionSignature) {
        let key = SmolStr::new(signature.name.to_ascii_uppercase());
        self.functions.insert(key, signature);
    }

    /// Copy of `self` with every signature of `other` added on top
    pub fn merged(&self, other: &SignatureTable) -> Self {
        let mut table = self.clone();
        for signature in other.functions.values() {
            table.insert(signature.clone());
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSignature> {
        if name.bytes().any(|b| b.is_ascii_lowercase()) {
            self.functions.get(name.to_ascii_uppercase().as_str())
        } else {
            self.functions.get(name)
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        self.get(name).is_some_and(FunctionSignature::is_aggregate)
    }

    pub fn is_table_calculation(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(FunctionSignature::is_table_calculation)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.values()
    }
}

type BuiltinRow = (
    &'static str,
    usize,
    Option<usize>,
    FunctionCategory,
    &'static [&'static str],
    &'static str,
);

const BUILTIN_FUNCTIONS: &[BuiltinRow] = {
    use FunctionCategory::*;
    &[
        // Aggregates
        ("SUM", 1, Some(1), Aggregate, &["number"], "number"),
        ("AVG", 1, Some(1), Aggregate, &["number"], "number"),
        ("MIN", 1, Some(2), Aggregate, &["any", "any"], "any"),
        ("MAX", 1, Some(2), Aggregate, &["any", "any"], "any"),
        ("COUNT", 1, Some(1), Aggregate, &["any"], "integer"),
        ("COUNTD", 1, Some(1), Aggregate, &["any"], "integer"),
        ("MEDIAN", 1, Some(1), Aggregate, &["number"], "number"),
        ("ATTR", 1, Some(1), Aggregate, &["any"], "any"),
        ("STDEV", 1, Some(1), Aggregate, &["number"], "number"),
        ("STDEVP", 1, Some(1), Aggregate, &["number"], "number"),
        ("VAR", 1, Some(1), Aggregate, &["number"], "number"),
        ("VARP", 1, Some(1), Aggregate, &["number"], "number"),
        ("PERCENTILE", 2, Some(2), Aggregate, &["number", "number"], "number"),
        ("CORR", 2, Some(2), Aggregate, &["number", "number"], "number"),
        ("COVAR", 2, Some(2), Aggregate, &["number", "number"], "number"),
        ("COVARP", 2, Some(2), Aggregate, &["number", "number"], "number"),
        // Table calculations
        ("RUNNING_SUM", 1, Some(1), TableCalculation, &["number"], "number"),
        ("RUNNING_AVG", 1, Some(1), TableCalculation, &["number"], "number"),
        ("RUNNING_COUNT", 1, Some(1), TableCalculation, &["any"], "number"),
        ("RUNNING_MIN", 1, Some(1), TableCalculation, &["number"], "number"),
        ("RUNNING_MAX", 1, Some(1), TableCalculation, &["number"], "number"),
        ("WINDOW_SUM", 1, Some(3), TableCalculation, &["number", "integer", "integer"], "number"),
        ("WINDOW_AVG", 1, Some(3), TableCalculation, &["number", "integer", "integer"], "number"),
        ("WINDOW_MIN", 1, Some(3), TableCalculation, &["number", "integer", "integer"], "number"),
        ("WINDOW_MAX", 1, Some(3), TableCalculation, &["number", "integer", "integer"], "number"),
        ("WINDOW_COUNT", 1, Some(3), TableCalculation, &["any", "integer", "integer"], "number"),
        ("WINDOW_MEDIAN", 1, Some(3), TableCalculation, &["number", "integer", "integer"], "number"),
        ("INDEX", 0, Some(0), TableCalculation, &[], "integer"),
        ("FIRST", 0, Some(0), TableCalculation, &[], "integer"),
        ("LAST", 0, Some(0), TableCalculation, &[], "integer"),
        ("SIZE", 0, Some(0), TableCalculation, &[], "integer"),
        ("RANK", 1, Some(2), TableCalculation, &["number", "string"], "integer"),
        ("RANK_DENSE", 1, Some(2), TableCalculation, &["number", "string"], "integer"),
        ("RANK_UNIQUE", 1, Some(2), TableCalculation, &["number", "string"], "integer"),
        ("RANK_PERCENTILE", 1, Some(2), TableCalculation, &["number", "string"], "number"),
        ("LOOKUP", 1, Some(2), TableCalculation, &["any", "integer"], "any"),
        ("PREVIOUS_VALUE", 1, Some(1), TableCalculation, &["any"], "any"),
        ("TOTAL", 1, Some(1), TableCalculation, &["any"], "any"),
        // Logical
        ("IIF", 3, Some(4), Logical, &["boolean", "any", "any", "any"], "any"),
        ("IFNULL", 2, Some(2), Logical, &["any", "any"], "any"),
        ("ISNULL", 1, Some(1), Logical, &["any"], "boolean"),
        ("ZN", 1, Some(1), Logical, &["number"], "number"),
        ("ISDATE", 1, Some(1), Logical, &["string"], "boolean"),
        // String
        ("LEN", 1, Some(1), String, &["string"], "integer"),
        ("LEFT", 2, Some(2), String, &["string", "integer"], "string"),
        ("RIGHT", 2, Some(2), String, &["string", "integer"], "string"),
        ("MID", 2, Some(3), String, &["string", "integer", "integer"], "string"),
        ("UPPER", 1, Some(1), String, &["string"], "string"),
        ("LOWER", 1, Some(1), String, &["string"], "string"),
        ("TRIM", 1, Some(1), String, &["string"], "string"),
        ("LTRIM", 1, Some(1), String, &["string"], "string"),
        ("RTRIM", 1, Some(1), String, &["string"], "string"),
        ("CONTAINS", 2, Some(2), String, &["string", "string"], "boolean"),
        ("STARTSWITH", 2, Some(2), String, &["string", "string"], "boolean"),
        ("ENDSWITH", 2, Some(2), String, &["string", "string"], "boolean"),
        ("FIND", 2, Some(3), String, &["string", "string", "integer"], "integer"),
        ("REPLACE", 3, Some(3), String, &["string", "string", "string"], "string"),
        ("SPLIT", 3, Some(3), String, &["string", "string", "integer"], "string"),
        ("SPACE", 1, Some(1), String, &["integer"], "string"),
        ("ASCII", 1, Some(1), String, &["string"], "integer"),
        ("CHAR", 1, Some(1), String, &["integer"], "string"),
        // Number
        ("ABS", 1, Some(1), Number, &["number"], "number"),
        ("ROUND", 1, Some(2), Number, &["number", "integer"], "number"),
        ("CEILING", 1, Some(1), Number, &["number"], "integer"),
        ("FLOOR", 1, Some(1), Number, &["number"], "integer"),
        ("SQRT", 1, Some(1), Number, &["number"], "number"),
        ("POWER", 2, Some(2), Number, &["number", "number"], "number"),
        ("EXP", 1, Some(1), Number, &["number"], "number"),
        ("LN", 1, Some(1), Number, &["number"], "number"),
        ("LOG", 1, Some(2), Number, &["number", "number"], "number"),
        ("SIGN", 1, Some(1), Number, &["number"], "integer"),
        ("DIV", 2, Some(2), Number, &["integer", "integer"], "integer"),
        ("PI", 0, Some(0), Number, &[], "number"),
        // Date
        ("DATEADD", 3, Some(3), Date, &["string", "integer", "date"], "date"),
        ("DATEDIFF", 3, Some(4), Date, &["string", "date", "date", "string"], "integer"),
        ("DATEPART", 2, Some(3), Date, &["string", "date", "string"], "integer"),
        ("DATETRUNC", 2, Some(3), Date, &["string", "date", "string"], "date"),
        ("DATENAME", 2, Some(3), Date, &["string", "date", "string"], "string"),
        ("MAKEDATE", 3, Some(3), Date, &["integer", "integer", "integer"], "date"),
        ("MAKEDATETIME", 2, Some(2), Date, &["date", "datetime"], "datetime"),
        ("TODAY", 0, Some(0), Date, &[], "date"),
        ("NOW", 0, Some(0), Date, &[], "datetime"),
        ("YEAR", 1, Some(1), Date, &["date"], "integer"),
        ("QUARTER", 1, Some(1), Date, &["date"], "integer"),
        ("MONTH", 1, Some(1), Date, &["date"], "integer"),
        ("WEEK", 1, Some(1), Date, &["date"], "integer"),
        ("DAY", 1, Some(1), Date, &["date"], "integer"),
        // Type conversion
        ("STR", 1, Some(1), TypeConversion, &["any"], "string"),
        ("INT", 1, Some(1), TypeConversion, &["any"], "integer"),
        ("FLOAT", 1, Some(1), TypeConversion, &["any"], "number"),
        ("DATE", 1, Some(1), TypeConversion, &["any"], "date"),
        ("DATETIME", 1, Some(1), TypeConversion, &["any"], "datetime"),
        // User
        ("USERNAME", 0, Some(0), User, &[], "string"),
        ("FULLNAME", 0, Some(0), User, &[], "string"),
        ("ISMEMBEROF", 1, Some(1), User, &["string"], "boolean"),
    ]
};
