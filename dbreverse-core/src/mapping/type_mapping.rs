//! SQL Server to .NET type resolution.
//!
//! Source type names are parsed into the closed [`SqlType`] enumeration and
//! mapped by a total function onto [`ClrType`]. Names outside the known set
//! land on the explicit `Unknown` variants instead of falling through.

use std::fmt;

/// SQL Server source types recognized by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    NVarChar,
    VarChar,
    Char,
    NChar,
    NText,
    Text,
    Xml,
    HierarchyId,
    BigInt,
    Int,
    SmallInt,
    TinyInt,
    Bit,
    UniqueIdentifier,
    SmallDateTime,
    DateTime,
    DateTime2,
    Date,
    DateTimeOffset,
    Time,
    Float,
    Real,
    Numeric,
    Decimal,
    Money,
    SmallMoney,
    Image,
    Binary,
    VarBinary,
    VarBinaryMax,
    Timestamp,
    RowVersion,
    Geography,
    Geometry,
    SqlVariant,
    /// The `table type` marker the parameter catalog reports for table-valued parameters
    TableType,
    Structured,
    Unknown,
}

impl SqlType {
    /// Parses a catalog type name, ignoring case.
    ///
    /// # Example
    /// ```rust
    /// use dbreverse_core::mapping::SqlType;
    ///
    /// assert_eq!(SqlType::parse("NVARCHAR"), SqlType::NVarChar);
    /// assert_eq!(SqlType::parse("table type"), SqlType::TableType);
    /// assert_eq!(SqlType::parse("vector"), SqlType::Unknown);
    /// ```
    pub fn parse(name: &str) -> Self {
        let lower = name.trim().to_lowercase();
        match lower.as_str() {
            "nvarchar" => Self::NVarChar,
            "varchar" => Self::VarChar,
            "char" => Self::Char,
            "nchar" => Self::NChar,
            "ntext" => Self::NText,
            "text" => Self::Text,
            "xml" => Self::Xml,
            "hierarchyid" => Self::HierarchyId,
            "bigint" => Self::BigInt,
            "int" => Self::Int,
            "smallint" => Self::SmallInt,
            "tinyint" => Self::TinyInt,
            "bit" => Self::Bit,
            "uniqueidentifier" => Self::UniqueIdentifier,
            "smalldatetime" => Self::SmallDateTime,
            "datetime" => Self::DateTime,
            "datetime2" => Self::DateTime2,
            "date" => Self::Date,
            "datetimeoffset" => Self::DateTimeOffset,
            "time" => Self::Time,
            "float" => Self::Float,
            "real" => Self::Real,
            "numeric" => Self::Numeric,
            "decimal" => Self::Decimal,
            "money" => Self::Money,
            "smallmoney" => Self::SmallMoney,
            "image" => Self::Image,
            "binary" => Self::Binary,
            "varbinary" => Self::VarBinary,
            "varbinary(max)" => Self::VarBinaryMax,
            "timestamp" => Self::Timestamp,
            "rowversion" => Self::RowVersion,
            "geography" => Self::Geography,
            "geometry" => Self::Geometry,
            "sql_variant" | "variant" => Self::SqlVariant,
            "table type" => Self::TableType,
            "structured" => Self::Structured,
            _ => Self::Unknown,
        }
    }

    /// Returns the .NET type a value of this source type maps to.
    ///
    /// Character types without a mapping of their own (`nchar`, `ntext`) and
    /// `sql_variant` resolve to [`ClrType::Unknown`].
    pub fn clr_type(self) -> ClrType {
        match self {
            Self::NVarChar | Self::VarChar | Self::Char | Self::Xml | Self::Text => ClrType::String,
            Self::HierarchyId => ClrType::SqlHierarchyId,
            Self::BigInt => ClrType::Long,
            Self::SmallInt => ClrType::Short,
            Self::Int => ClrType::Int,
            Self::UniqueIdentifier => ClrType::Guid,
            Self::SmallDateTime | Self::DateTime | Self::DateTime2 | Self::Date => {
                ClrType::DateTime
            }
            Self::DateTimeOffset => ClrType::DateTimeOffset,
            Self::TableType => ClrType::DataTable,
            Self::Time => ClrType::TimeSpan,
            Self::Float => ClrType::Double,
            Self::Real => ClrType::Float,
            Self::Numeric | Self::SmallMoney | Self::Decimal | Self::Money => ClrType::Decimal,
            Self::TinyInt => ClrType::Byte,
            Self::Bit => ClrType::Bool,
            Self::Image
            | Self::Binary
            | Self::VarBinary
            | Self::VarBinaryMax
            | Self::Timestamp
            | Self::RowVersion => ClrType::ByteArray,
            Self::Geography => ClrType::DbGeography,
            Self::Geometry => ClrType::DbGeometry,
            Self::NChar | Self::NText | Self::SqlVariant | Self::Structured | Self::Unknown => {
                ClrType::Unknown
            }
        }
    }

    /// Name of the `System.Data.SqlDbType` member used when binding a value of
    /// this type as a command parameter.
    pub fn sql_db_type(self) -> Option<&'static str> {
        let name = match self {
            Self::HierarchyId => "VarChar",
            Self::BigInt => "BigInt",
            Self::Binary => "Binary",
            Self::Bit => "Bit",
            Self::Char => "Char",
            Self::DateTime => "DateTime",
            Self::Decimal | Self::Numeric => "Decimal",
            Self::Float => "Float",
            Self::Image => "Image",
            Self::Int => "Int",
            Self::Money => "Money",
            Self::NChar => "NChar",
            Self::NText => "NText",
            Self::NVarChar => "NVarChar",
            Self::Real => "Real",
            Self::UniqueIdentifier => "UniqueIdentifier",
            Self::SmallDateTime => "SmallDateTime",
            Self::SmallInt => "SmallInt",
            Self::SmallMoney => "SmallMoney",
            Self::Text => "Text",
            Self::Timestamp | Self::RowVersion => "Timestamp",
            Self::TinyInt => "TinyInt",
            Self::VarBinary | Self::VarBinaryMax => "VarBinary",
            Self::VarChar => "VarChar",
            Self::SqlVariant => "Variant",
            Self::Xml => "Xml",
            Self::TableType | Self::Structured => "Structured",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::DateTime2 => "DateTime2",
            Self::DateTimeOffset => "DateTimeOffset",
            Self::Geography | Self::Geometry | Self::Unknown => return None,
        };
        Some(name)
    }

    /// True for types whose values the server generates on every write.
    pub fn is_row_version(self) -> bool {
        matches!(self, Self::Timestamp | Self::RowVersion)
    }
}

/// .NET target types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClrType {
    String,
    SqlHierarchyId,
    Long,
    Short,
    Int,
    Guid,
    DateTime,
    DateTimeOffset,
    DataTable,
    TimeSpan,
    Double,
    Float,
    Decimal,
    Byte,
    Bool,
    ByteArray,
    DbGeography,
    DbGeometry,
    Object,
    Unknown,
}

impl ClrType {
    const KNOWN: [Self; 19] = [
        Self::String,
        Self::SqlHierarchyId,
        Self::Long,
        Self::Short,
        Self::Int,
        Self::Guid,
        Self::DateTime,
        Self::DateTimeOffset,
        Self::DataTable,
        Self::TimeSpan,
        Self::Double,
        Self::Float,
        Self::Decimal,
        Self::Byte,
        Self::Bool,
        Self::ByteArray,
        Self::DbGeography,
        Self::DbGeometry,
        Self::Object,
    ];

    /// Reverse of [`ClrType::type_name`].
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::KNOWN.into_iter().find(|t| t.type_name() == Some(name))
    }

    /// Returns the type name as written in C# source, or `None` for
    /// [`ClrType::Unknown`].
    pub fn type_name(self) -> Option<&'static str> {
        let name = match self {
            Self::String => "string",
            Self::SqlHierarchyId => "SqlHierarchyId",
            Self::Long => "long",
            Self::Short => "short",
            Self::Int => "int",
            Self::Guid => "Guid",
            Self::DateTime => "DateTime",
            Self::DateTimeOffset => "DateTimeOffset",
            Self::DataTable => "DataTable",
            Self::TimeSpan => "TimeSpan",
            Self::Double => "double",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Byte => "byte",
            Self::Bool => "bool",
            Self::ByteArray => "byte[]",
            Self::DbGeography => "System.Data.Entity.Spatial.DbGeography",
            Self::DbGeometry => "System.Data.Entity.Spatial.DbGeometry",
            Self::Object => "object",
            Self::Unknown => return None,
        };
        Some(name)
    }

    /// Returns false for reference types, which cannot be declared `Nullable<T>`.
    pub fn can_be_nullable(self) -> bool {
        !matches!(
            self,
            Self::String
                | Self::Object
                | Self::DataTable
                | Self::ByteArray
                | Self::DbGeography
                | Self::DbGeometry
        )
    }
}

impl fmt::Display for ClrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name().unwrap_or("?"))
    }
}

/// Checks a resolved type name (as produced by any provider) for nullability.
///
/// Accepts both C# aliases and fully qualified names. Names no provider of
/// this crate produces (enums, custom structs) are assumed to be value types.
pub fn type_name_can_be_nullable(type_name: &str) -> bool {
    match ClrType::from_type_name(type_name) {
        Some(clr_type) => clr_type.can_be_nullable(),
        None => !matches!(
            type_name,
            "System.String" | "System.Object" | "System.Data.DataTable" | "System.Byte[]"
        ),
    }
}

/// Resolves target type names for catalog columns and parameters.
///
/// Implementations receive the owning object and column names as context so
/// that specific columns can be mapped differently (e.g. to enums). Returning
/// `None` means "no mapping"; callers substitute `object`.
pub trait TypeNameProvider: Send + Sync + fmt::Debug {
    /// Resolves the type of a table, table-type or result-set column.
    fn column_type_name(
        &self,
        sql_type: Option<&str>,
        object_name: Option<&str>,
        column_name: Option<&str>,
    ) -> Option<String>;

    /// Resolves the type of a stored procedure parameter.
    fn parameter_type_name(
        &self,
        sql_type: Option<&str>,
        parameter_name: &str,
        object_name: Option<&str>,
        column_name: Option<&str>,
    ) -> Option<String>;
}

/// Default provider backed by [`SqlType::clr_type`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClrTypeNameProvider;

impl ClrTypeNameProvider {
    fn resolve(sql_type: Option<&str>) -> Option<String> {
        let sql_type = sql_type.filter(|t| !t.is_empty())?;
        SqlType::parse(sql_type)
            .clr_type()
            .type_name()
            .map(str::to_string)
    }
}

impl TypeNameProvider for ClrTypeNameProvider {
    fn column_type_name(
        &self,
        sql_type: Option<&str>,
        _object_name: Option<&str>,
        _column_name: Option<&str>,
    ) -> Option<String> {
        Self::resolve(sql_type)
    }

    fn parameter_type_name(
        &self,
        sql_type: Option<&str>,
        _parameter_name: &str,
        _object_name: Option<&str>,
        _column_name: Option<&str>,
    ) -> Option<String> {
        Self::resolve(sql_type)
    }
}
