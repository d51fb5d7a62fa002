use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type PersonId = String;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub name: String,
    pub amount: Decimal,
    pub payer_id: PersonId,
    pub participant_ids: Vec<PersonId>,
}

/// An expense as submitted, before the store assigns it an id.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExpense {
    pub name: String,
    pub amount: Decimal,
    pub payer_id: PersonId,
    pub participant_ids: Vec<PersonId>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub people: Vec<Person>,
    pub expenses: Vec<Expense>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
}

impl Bill {
    pub fn person(&self, id: &str) -> Option<&Person> {
        self.people.iter().find(|person| person.id == id)
    }

    /// Bank code and account number, when both are present.
    pub fn bank_account(&self) -> Option<(&str, &str)> {
        match (&self.bank_code, &self.account_number) {
            (Some(bank), Some(account)) => Some((bank.as_str(), account.as_str())),
            _ => None,
        }
    }
}

/// Net balance of one person: positive is owed money, negative owes money.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub person_id: PersonId,
    pub person_name: String,
    pub amount_owed: Decimal,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Transaction {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub settlements: Vec<Settlement>,
    pub transactions: Vec<Transaction>,
    pub total: Decimal,
    pub per_person: Decimal,
}

impl SettlementReport {
    pub fn empty() -> Self {
        SettlementReport {
            settlements: vec![],
            transactions: vec![],
            total: Decimal::ZERO,
            per_person: Decimal::ZERO,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PaidExpense {
    pub expense: Expense,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ParticipatedExpense {
    pub expense: Expense,
    pub share: Decimal,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDetails {
    pub total_paid: Decimal,
    pub paid_expenses: Vec<PaidExpense>,
    pub participated_expenses: Vec<ParticipatedExpense>,
}
