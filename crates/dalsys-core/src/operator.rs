//! Operator records and the eligibility rules checked before they are stored.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::action::{ActionOp, Committer, PendingAction};
use crate::drone;
use crate::error::{DalsysError, Result};
use crate::persistence::{Fields, Persistence, Row, Table, Value, Write};
use crate::types::LicenseClass;

pub const FIRST_NAME_REQUIRED: &str = "First name is required";
pub const DATE_OF_BIRTH_REQUIRED: &str = "Date of birth is required";
pub const DRONE_LICENSE_REQUIRED: &str = "Drone license is required";
pub const CLASS_TWO_AGE: &str = "Operator should be at least twenty to hold a class two license";
pub const RESCUE_OPERATIONS: &str = "To hold a rescue drone endorsement, the operator must have been involved in five prior rescue operations";

/// Minimum age, in whole years, for a class-two license.
pub const CLASS_TWO_MIN_AGE: i32 = 20;
/// Completed rescue operations needed for a rescue endorsement.
pub const RESCUE_MIN_OPERATIONS: u32 = 5;

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// A human operator. Also used as the candidate passed to validation, so
/// every field a form might leave blank is optional.
///
/// `drone` mirrors the allocation held on the drone record and only changes
/// through allocation, unallocation or removal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Operator {
    pub id: Option<u64>,
    pub first_name: Option<String>,
    pub family_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub drone_license: Option<LicenseClass>,
    pub rescue_endorsement: bool,
    pub operations: u32,
    pub drone: Option<u64>,
}

impl Operator {
    pub fn new(first_name: impl Into<String>, family_name: impl Into<String>) -> Self {
        Self {
            first_name: Some(first_name.into()),
            family_name: Some(family_name.into()),
            ..Self::default()
        }
    }

    pub fn with_first_name(self, first_name: impl Into<String>) -> Self {
        Self {
            first_name: Some(first_name.into()),
            ..self
        }
    }

    pub fn with_family_name(self, family_name: impl Into<String>) -> Self {
        Self {
            family_name: Some(family_name.into()),
            ..self
        }
    }

    pub fn with_date_of_birth(self, date_of_birth: NaiveDate) -> Self {
        Self {
            date_of_birth: Some(date_of_birth),
            ..self
        }
    }

    pub fn with_license(self, drone_license: LicenseClass) -> Self {
        Self {
            drone_license: Some(drone_license),
            ..self
        }
    }

    pub fn with_rescue_endorsement(self, rescue_endorsement: bool) -> Self {
        Self {
            rescue_endorsement,
            ..self
        }
    }

    pub fn with_operations(self, operations: u32) -> Self {
        Self { operations, ..self }
    }

    /// "First Family", skipping whichever part is missing.
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whole years of age on `today`, or `None` without a date of birth.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        self.date_of_birth.map(|dob| age_on(dob, today))
    }

    fn to_fields(&self) -> Fields {
        let mut f = Fields::new();
        f.insert("first_name".into(), Value::from(self.first_name.as_deref()));
        f.insert("family_name".into(), Value::from(self.family_name.as_deref()));
        f.insert("date_of_birth".into(), Value::from(self.date_of_birth));
        f.insert("drone_license".into(), Value::from(self.drone_license));
        f.insert("rescue_endorsement".into(), Value::from(self.rescue_endorsement));
        f.insert("operations".into(), Value::from(i64::from(self.operations)));
        f
    }

    fn from_fields(id: u64, fields: &Fields) -> Result<Self> {
        let row = Row::new(Table::Operators, id, fields);
        Ok(Self {
            id: Some(id),
            first_name: row.text("first_name")?,
            family_name: row.text("family_name")?,
            date_of_birth: row.date("date_of_birth")?,
            drone_license: row.class("drone_license")?,
            rescue_endorsement: row.flag("rescue_endorsement")?,
            operations: row.count("operations")?,
            drone: row.id("drone_id")?,
        })
    }
}

/// Calendar age: the year difference, less one if the birthday has not yet
/// come round this year.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let before_birthday =
        (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day());
    today.year() - date_of_birth.year() - i32::from(before_birthday)
}

/// Run every operator rule against `candidate`. Rules are independent; all
/// of them run and each failure adds its own message.
pub fn check_operator(candidate: &Operator, today: NaiveDate, action: &mut PendingAction<Operator>) {
    let blank = |s: &Option<String>| s.as_deref().map_or(true, |s| s.trim().is_empty());

    if blank(&candidate.first_name) {
        action.add_message(FIRST_NAME_REQUIRED);
    }
    if candidate.date_of_birth.is_none() {
        action.add_message(DATE_OF_BIRTH_REQUIRED);
    }
    if candidate.drone_license.is_none() {
        action.add_message(DRONE_LICENSE_REQUIRED);
    }
    if candidate.drone_license == Some(LicenseClass::Two) {
        if let Some(age) = candidate.age_on(today) {
            if age < CLASS_TWO_MIN_AGE {
                action.add_message(CLASS_TWO_AGE);
            }
        }
    }
    if candidate.rescue_endorsement && candidate.operations < RESCUE_MIN_OPERATIONS {
        action.add_message(RESCUE_OPERATIONS);
    }
}

// ---------------------------------------------------------------------------
// Filter / lookup key
// ---------------------------------------------------------------------------

/// Conjunction of optional predicates for `list_all`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatorFilter {
    pub license: Option<LicenseClass>,
    pub rescue_endorsement: Option<bool>,
}

impl OperatorFilter {
    pub fn matches(&self, operator: &Operator) -> bool {
        self.license.map_or(true, |l| operator.drone_license == Some(l))
            && self
                .rescue_endorsement
                .map_or(true, |r| operator.rescue_endorsement == r)
    }
}

/// How a caller names the operator in an allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorRef {
    Id(u64),
    Name { first: String, family: String },
}

impl OperatorRef {
    /// Parse a command-line reference: digits are an id, anything else is
    /// "First Family" split at the first space.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u64>() {
            return Some(OperatorRef::Id(id));
        }
        let (first, family) = s.split_once(' ')?;
        Some(OperatorRef::Name {
            first: first.trim().to_string(),
            family: family.trim().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Shared reads (also used by the drone store)
// ---------------------------------------------------------------------------

pub(crate) fn load<P: Persistence + ?Sized>(db: &P, id: u64) -> Result<Operator> {
    let fields = db
        .fetch_by_id(Table::Operators, id)?
        .ok_or_else(|| Table::Operators.not_found(id))?;
    Operator::from_fields(id, &fields)
}

pub(crate) fn load_all<P: Persistence + ?Sized>(db: &P) -> Result<Vec<Operator>> {
    db.fetch_all(Table::Operators, "family_name")?
        .iter()
        .map(|(id, fields)| Operator::from_fields(*id, fields))
        .collect()
}

pub(crate) fn resolve<P: Persistence + ?Sized>(db: &P, reference: &OperatorRef) -> Result<Operator> {
    match reference {
        OperatorRef::Id(id) => load(db, *id),
        OperatorRef::Name { first, family } => {
            let mut matches: Vec<Operator> = load_all(db)?
                .into_iter()
                .filter(|o| {
                    o.first_name.as_deref().is_some_and(|f| f.eq_ignore_ascii_case(first))
                        && o.family_name.as_deref().is_some_and(|f| f.eq_ignore_ascii_case(family))
                })
                .collect();
            let name = format!("{first} {family}");
            match matches.len() {
                0 => Err(DalsysError::OperatorNameNotFound(name)),
                1 => Ok(matches.remove(0)),
                _ => Err(DalsysError::AmbiguousOperator(name)),
            }
        }
    }
}

fn link_field(drone: Option<u64>) -> Fields {
    let mut f = Fields::new();
    f.insert("drone_id".into(), Value::from(drone.map(|id| id as i64)));
    f
}

pub(crate) fn link_write(operator_id: u64, drone: Option<u64>) -> Write {
    Write::Update {
        table: Table::Operators,
        id: operator_id,
        fields: link_field(drone),
    }
}

// ---------------------------------------------------------------------------
// OperatorStore
// ---------------------------------------------------------------------------

pub struct OperatorStore<'a, P: Persistence + ?Sized> {
    db: &'a mut P,
    today: Option<NaiveDate>,
}

impl<'a, P: Persistence + ?Sized> OperatorStore<'a, P> {
    pub fn new(db: &'a mut P) -> Self {
        Self { db, today: None }
    }

    /// Evaluate age rules as of a fixed date instead of the local clock.
    pub fn as_of(self, today: NaiveDate) -> Self {
        Self {
            today: Some(today),
            ..self
        }
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Validate a new operator. Any id or drone link on the candidate is
    /// ignored: the store assigns the id and new operators start unallocated.
    pub fn validate_add(&self, candidate: Operator) -> PendingAction<Operator> {
        let candidate = Operator {
            id: None,
            drone: None,
            ..candidate
        };
        let mut action = PendingAction::new(candidate.clone(), ActionOp::Create);
        check_operator(&candidate, self.today(), &mut action);
        tracing::debug!(messages = action.messages().len(), "validated new operator");
        action
    }

    /// Validate changes to an existing operator. Fails with `MissingId` or
    /// `NotFound` if the candidate does not name a stored operator.
    ///
    /// The allocation link is taken from storage, not the candidate. If the
    /// operator holds a drone, the new license must still permit its class.
    pub fn validate_update(&self, candidate: Operator) -> Result<PendingAction<Operator>> {
        let id = candidate.id.ok_or(DalsysError::MissingId)?;
        let stored = load(&*self.db, id)?;
        let candidate = Operator {
            drone: stored.drone,
            ..candidate
        };

        let mut action = PendingAction::new(candidate.clone(), ActionOp::Update);
        check_operator(&candidate, self.today(), &mut action);

        if let (Some(drone_id), Some(license)) = (candidate.drone, candidate.drone_license) {
            let held = drone::load(&*self.db, drone_id)?;
            if let Some(class) = held.class_type {
                if !license.permits(class) {
                    action.add_message(format!(
                        "Operator is allocated to a class {class} drone and cannot hold a class {license} license"
                    ));
                }
            }
        }
        tracing::debug!(id, messages = action.messages().len(), "validated operator update");
        Ok(action)
    }

    pub fn get(&self, id: u64) -> Result<Operator> {
        load(&*self.db, id)
    }

    pub fn find(&self, reference: &OperatorRef) -> Result<Operator> {
        resolve(&*self.db, reference)
    }

    /// Snapshot of all operators matching `filter`, ordered by family name
    /// then id.
    pub fn list_all(&self, filter: &OperatorFilter) -> Result<Vec<Operator>> {
        Ok(load_all(&*self.db)?
            .into_iter()
            .filter(|o| filter.matches(o))
            .collect())
    }

    /// Delete an operator. If it holds a drone, the drone is unallocated in
    /// the same batch.
    pub fn remove(&mut self, id: u64) -> Result<()> {
        let stored = load(&*self.db, id)?;
        let mut writes = Vec::new();
        if let Some(drone_id) = stored.drone {
            writes.push(drone::link_write(drone_id, None));
        }
        writes.push(Write::Delete {
            table: Table::Operators,
            id,
        });
        self.db.write_batch(&writes)?;
        tracing::info!(id, "operator removed");
        Ok(())
    }
}

impl<P: Persistence + ?Sized> Committer<Operator> for OperatorStore<'_, P> {
    fn apply(&mut self, op: &ActionOp, candidate: &Operator) -> Result<Operator> {
        match op {
            ActionOp::Create => {
                let mut fields = candidate.to_fields();
                fields.insert("drone_id".into(), Value::Null);
                let id = self.db.insert_record(Table::Operators, &fields)?;
                load(&*self.db, id)
            }
            ActionOp::Update => {
                let id = candidate.id.ok_or(DalsysError::MissingId)?;
                self.db
                    .update_record(Table::Operators, id, &candidate.to_fields())?;
                load(&*self.db, id)
            }
            other => Err(DalsysError::UnsupportedAction {
                store: "operator",
                op: other.as_str(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
