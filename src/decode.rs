//! Decoding of raw SQLite column values into JSON values.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteValueRef;
use sqlx::{TypeInfo, Value, ValueRef};
use time::{Date, PrimitiveDateTime, Time};

use crate::error::{Error, Result};

/// Decode a single column value to JSON.
///
/// Integer precision is preserved by decoding INTEGER columns as `i64`
/// rather than going through `f64`; BLOB columns are base64 encoded.
pub(crate) fn to_json(v: SqliteValueRef<'_>) -> Result<JsonValue> {
   if v.is_null() {
      return Ok(JsonValue::Null);
   }

   let res = match v.type_info().name() {
      "TEXT" => v
         .to_owned()
         .try_decode::<String>()
         .map(JsonValue::String)
         .unwrap_or(JsonValue::Null),
      "REAL" => v
         .to_owned()
         .try_decode::<f64>()
         .map(JsonValue::from)
         .unwrap_or(JsonValue::Null),
      "INTEGER" | "NUMERIC" => v
         .to_owned()
         .try_decode::<i64>()
         .map(JsonValue::from)
         .unwrap_or(JsonValue::Null),
      "BOOLEAN" => v
         .to_owned()
         .try_decode::<bool>()
         .map(JsonValue::Bool)
         .unwrap_or(JsonValue::Null),
      "DATE" => v
         .to_owned()
         .try_decode::<Date>()
         .map(|date| JsonValue::String(date.to_string()))
         .unwrap_or(JsonValue::Null),
      "TIME" => v
         .to_owned()
         .try_decode::<Time>()
         .map(|time| JsonValue::String(time.to_string()))
         .unwrap_or(JsonValue::Null),
      "DATETIME" => v
         .to_owned()
         .try_decode::<PrimitiveDateTime>()
         .map(|dt| JsonValue::String(dt.to_string()))
         .unwrap_or(JsonValue::Null),
      "BLOB" => v
         .to_owned()
         .try_decode::<Vec<u8>>()
         .map(|bytes| JsonValue::String(BASE64.encode(bytes)))
         .unwrap_or(JsonValue::Null),
      name => return Err(Error::UnsupportedDatatype(name.to_string())),
   };

   Ok(res)
}
