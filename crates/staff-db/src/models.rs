use crate::{Document, Fields};
use jiff::Timestamp;
use serde_json::Value;
use std::cmp::Ordering;

pub const USERS: &str = "users";
pub const STAFF: &str = "staff";

/// Document field names shared by user and staff records.
pub mod field {
    pub const USER_ID: &str = "userId";
    pub const ROLE: &str = "role";
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const USN: &str = "usn";
    pub const DEPARTMENT: &str = "department";
    pub const PHONE: &str = "phone";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

impl From<Role> for Value {
    fn from(role: Role) -> Self {
        Value::String(role.as_str().to_owned())
    }
}

/// Staff projection of a teacher's user record, stored under the user's id.
#[derive(Clone, Debug, PartialEq)]
pub struct StaffRecord {
    pub user_id: String,
    pub role: Role,
    pub name: Option<String>,
    pub email: Option<String>,
    pub usn: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub created_at: Option<Value>,
    pub updated_at: Option<Value>,
}

impl StaffRecord {
    /// Blank values on the user record (missing, `null`, `false`, zero or
    /// `""`) all project to `None`.
    pub fn from_user(user: &Document) -> Self {
        Self {
            user_id: user.id.clone(),
            role: Role::Teacher,
            name: text(user.field(field::NAME)),
            email: text(user.field(field::EMAIL)),
            usn: text(user.field(field::USN)),
            department: text(user.field(field::DEPARTMENT)),
            phone: text(user.field(field::PHONE)),
            created_at: verbatim(user.field(field::CREATED_AT)),
            updated_at: verbatim(user.field(field::UPDATED_AT)),
        }
    }

    /// Every key is written; `None` becomes an explicit `null`.
    pub fn into_fields(self) -> Fields {
        let optional = |value: Option<String>| value.map(Value::String).unwrap_or(Value::Null);
        let mut fields = Fields::new();
        fields.insert(field::USER_ID.to_owned(), Value::String(self.user_id));
        fields.insert(field::ROLE.to_owned(), self.role.into());
        fields.insert(field::NAME.to_owned(), optional(self.name));
        fields.insert(field::EMAIL.to_owned(), optional(self.email));
        fields.insert(field::USN.to_owned(), optional(self.usn));
        fields.insert(field::DEPARTMENT.to_owned(), optional(self.department));
        fields.insert(field::PHONE.to_owned(), optional(self.phone));
        fields.insert(
            field::CREATED_AT.to_owned(),
            self.created_at.unwrap_or(Value::Null),
        );
        fields.insert(
            field::UPDATED_AT.to_owned(),
            self.updated_at.unwrap_or(Value::Null),
        );
        fields
    }
}

/// Read model of a staff document as the roster displays it.
#[derive(Clone, Debug, PartialEq)]
pub struct StaffRow {
    pub id: String,
    pub name: Option<String>,
    pub usn: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub created_at: Option<Timestamp>,
}

impl StaffRow {
    pub fn from_document(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            name: text(document.field(field::NAME)),
            usn: text(document.field(field::USN)),
            email: text(document.field(field::EMAIL)),
            department: text(document.field(field::DEPARTMENT)),
            phone: text(document.field(field::PHONE)),
            created_at: document.field(field::CREATED_AT).and_then(parse_timestamp),
        }
    }

    /// Newest first; rows without a usable `createdAt` count as the epoch.
    /// Equal timestamps fall back to the id.
    pub fn roster_order(a: &StaffRow, b: &StaffRow) -> Ordering {
        let key = |row: &StaffRow| row.created_at.unwrap_or(Timestamp::UNIX_EPOCH);
        key(b).cmp(&key(a)).then_with(|| a.id.cmp(&b.id))
    }
}

/// Accepts RFC 3339 strings, integer milliseconds since the epoch, and
/// `{ "seconds", "nanoseconds" }` objects.
pub fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(text) => text.parse::<Timestamp>().ok(),
        Value::Number(number) => Timestamp::from_millisecond(number.as_i64()?).ok(),
        Value::Object(object) => {
            let seconds = object.get("seconds")?.as_i64()?;
            let nanoseconds = object
                .get("nanoseconds")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            Timestamp::new(seconds, i32::try_from(nanoseconds).ok()?).ok()
        }
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        value if is_blank(value) => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn verbatim(value: Option<&Value>) -> Option<Value> {
    value.filter(|value| !is_blank(value)).cloned()
}
