//! The bill being edited plus the list of saved bills.
//!
//! `BillStore` is plain state: it never touches storage itself. Callers take a
//! [`StoreSnapshot`] after mutating and hand it to a [`crate::storage::BillStorage`].

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BillError;
use crate::money::{checked_sum, ensure_non_negative};
use crate::schemas::{Bill, Expense, NewExpense, Person, PersonId};

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub current_bill: Option<Bill>,
    #[serde(default)]
    pub bills: Vec<Bill>,
}

/// What happened to the bill's expenses when a person was removed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRemoval {
    pub person: Person,
    /// Who now pays for the removed person's expenses, if anyone is left.
    pub new_payer: Option<PersonId>,
    pub reassigned_expenses: Vec<String>,
    /// Expenses left without participants; they no longer affect balances.
    pub emptied_expenses: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct BillStore {
    current_bill: Option<Bill>,
    bills: Vec<Bill>,
}

impl BillStore {
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        BillStore {
            current_bill: snapshot.current_bill,
            bills: snapshot.bills,
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            current_bill: self.current_bill.clone(),
            bills: self.bills.clone(),
        }
    }

    pub fn current_bill(&self) -> Option<&Bill> {
        self.current_bill.as_ref()
    }

    pub fn bills(&self) -> &[Bill] {
        &self.bills
    }

    fn current_mut(&mut self) -> Result<&mut Bill, BillError> {
        self.current_bill.as_mut().ok_or(BillError::NoCurrentBill)
    }

    /// Starts a new, empty current bill. It only joins the saved list once saved.
    pub fn create_bill(&mut self, name: &str) -> Result<&Bill, BillError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BillError::EmptyName("bill name"));
        }
        let bill = Bill {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            date: Utc::now(),
            people: vec![],
            expenses: vec![],
            bank_code: None,
            account_number: None,
        };
        tracing::debug!(bill = %bill.id, "bill created");
        Ok(&*self.current_bill.insert(bill))
    }

    pub fn add_person(&mut self, name: &str) -> Result<Person, BillError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BillError::EmptyName("person name"));
        }
        let bill = self.current_mut()?;
        let person = Person {
            id: format!("person-{}", Uuid::new_v4()),
            name: name.to_string(),
        };
        bill.people.push(person.clone());
        tracing::debug!(bill = %bill.id, person = %person.id, "person added");
        Ok(person)
    }

    /// Removes a person and strips them from every expense.
    ///
    /// Expenses they paid for are handed to the first person still on the bill, or left
    /// without a payer when nobody remains.
    pub fn remove_person(&mut self, id: &str) -> Result<PersonRemoval, BillError> {
        let bill = self.current_mut()?;
        let index = bill
            .people
            .iter()
            .position(|person| person.id == id)
            .ok_or_else(|| BillError::PersonNotFound(id.to_string()))?;
        let person = bill.people.remove(index);
        let new_payer = bill.people.first().map(|person| person.id.clone());

        let mut reassigned_expenses = Vec::new();
        let mut emptied_expenses = Vec::new();
        for expense in &mut bill.expenses {
            if expense.payer_id == id {
                expense.payer_id = new_payer.clone().unwrap_or_default();
                reassigned_expenses.push(expense.id.clone());
            }
            let listed = expense.participant_ids.len();
            expense.participant_ids.retain(|participant| participant != id);
            if listed > 0 && expense.participant_ids.is_empty() {
                emptied_expenses.push(expense.id.clone());
            }
        }

        for expense in &reassigned_expenses {
            tracing::warn!(
                bill = %bill.id,
                expense = %expense,
                removed = %person.id,
                new_payer = new_payer.as_deref().unwrap_or(""),
                "expense payer reassigned"
            );
        }
        for expense in &emptied_expenses {
            tracing::warn!(bill = %bill.id, expense = %expense, "expense has no participants left");
        }

        Ok(PersonRemoval {
            person,
            new_payer,
            reassigned_expenses,
            emptied_expenses,
        })
    }

    pub fn add_expense(&mut self, expense: NewExpense) -> Result<Expense, BillError> {
        let bill = self.current_mut()?;
        let name = expense.name.trim();
        if name.is_empty() {
            return Err(BillError::EmptyName("expense name"));
        }
        let amount = ensure_non_negative(expense.amount)?;
        if bill.person(&expense.payer_id).is_none() {
            return Err(BillError::UnknownParticipant(expense.payer_id));
        }
        if expense.participant_ids.is_empty() {
            return Err(BillError::NoParticipants);
        }
        let mut seen = HashSet::new();
        for participant in &expense.participant_ids {
            if !seen.insert(participant.as_str()) {
                return Err(BillError::DuplicateParticipant(participant.clone()));
            }
            if bill.person(participant).is_none() {
                return Err(BillError::UnknownParticipant(participant.clone()));
            }
        }
        // Every later calculation sums the bill, so the sum has to stay representable.
        checked_sum(bill.expenses.iter().map(|expense| expense.amount).chain([amount]))?;

        let expense = Expense {
            id: format!("expense-{}", Uuid::new_v4()),
            name: name.to_string(),
            amount,
            payer_id: expense.payer_id,
            participant_ids: expense.participant_ids,
        };
        bill.expenses.push(expense.clone());
        tracing::debug!(
            bill = %bill.id,
            expense = %expense.id,
            amount = %expense.amount,
            "expense added"
        );
        Ok(expense)
    }

    pub fn remove_expense(&mut self, id: &str) -> Result<Expense, BillError> {
        let bill = self.current_mut()?;
        let index = bill
            .expenses
            .iter()
            .position(|expense| expense.id == id)
            .ok_or_else(|| BillError::ExpenseNotFound(id.to_string()))?;
        Ok(bill.expenses.remove(index))
    }

    pub fn set_current_bill(&mut self, bill: Option<Bill>) {
        self.current_bill = bill;
    }

    /// Makes a copy of a saved bill the current one.
    pub fn open_bill(&mut self, id: &str) -> Result<&Bill, BillError> {
        let bill = self
            .bills
            .iter()
            .find(|bill| bill.id == id)
            .cloned()
            .ok_or_else(|| BillError::BillNotFound(id.to_string()))?;
        Ok(&*self.current_bill.insert(bill))
    }

    pub fn clear_current_bill(&mut self) {
        self.current_bill = None;
    }

    pub fn delete_bill(&mut self, id: &str) -> Result<(), BillError> {
        let saved = self.bills.len();
        self.bills.retain(|bill| bill.id != id);
        let was_current = self.current_bill.as_ref().is_some_and(|bill| bill.id == id);
        if was_current {
            self.current_bill = None;
        }
        if saved == self.bills.len() && !was_current {
            return Err(BillError::BillNotFound(id.to_string()));
        }
        tracing::debug!(bill = %id, "bill deleted");
        Ok(())
    }

    /// Sets the transfer account shown on settlements. Blank values clear the field.
    pub fn update_bank_info(
        &mut self,
        bank_code: Option<String>,
        account_number: Option<String>,
    ) -> Result<&Bill, BillError> {
        let bill = self.current_mut()?;
        bill.bank_code = bank_code.filter(|code| !code.trim().is_empty());
        bill.account_number = account_number.filter(|number| !number.trim().is_empty());
        Ok(&*bill)
    }

    /// Writes the current bill into the saved list, replacing a saved copy in place.
    pub fn save_current_bill_to_list(&mut self) -> Result<&Bill, BillError> {
        let bill = self.current_bill.clone().ok_or(BillError::NoCurrentBill)?;
        let index = match self.bills.iter().position(|saved| saved.id == bill.id) {
            Some(index) => {
                self.bills[index] = bill;
                index
            }
            None => {
                self.bills.push(bill);
                self.bills.len() - 1
            }
        };
        Ok(&self.bills[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::calculate_settlement;
    use crate::money::MoneyError;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn store_with(people: &[&str]) -> (BillStore, Vec<Person>) {
        let mut store = BillStore::default();
        store.create_bill("Trip").unwrap();
        let people = people
            .iter()
            .map(|name| store.add_person(name).unwrap())
            .collect();
        (store, people)
    }

    fn new_expense(amount: Decimal, payer: &Person, participants: &[&Person]) -> NewExpense {
        NewExpense {
            name: "Dinner".to_string(),
            amount,
            payer_id: payer.id.clone(),
            participant_ids: participants.iter().map(|p| p.id.clone()).collect(),
        }
    }

    #[test]
    fn mutations_need_a_current_bill() {
        let mut store = BillStore::default();
        assert!(matches!(store.add_person("Ann"), Err(BillError::NoCurrentBill)));
        assert!(matches!(store.remove_expense("e"), Err(BillError::NoCurrentBill)));
        assert!(matches!(
            store.save_current_bill_to_list(),
            Err(BillError::NoCurrentBill)
        ));
    }

    #[test]
    fn created_bill_is_current_but_unsaved() {
        let mut store = BillStore::default();
        let bill = store.create_bill("  Trip ").unwrap().clone();
        assert_eq!(bill.name, "Trip");
        assert!(bill.people.is_empty());
        assert_eq!(store.current_bill(), Some(&bill));
        assert!(store.bills().is_empty());
        assert!(matches!(store.create_bill(" "), Err(BillError::EmptyName(_))));
    }

    #[test]
    fn people_get_prefixed_ids() {
        let (_, people) = store_with(&["Ann", "Ben"]);
        assert!(people[0].id.starts_with("person-"));
        assert_ne!(people[0].id, people[1].id);
    }

    #[test]
    fn expenses_are_validated() {
        let (mut store, people) = store_with(&["Ann", "Ben"]);
        let (ann, ben) = (&people[0], &people[1]);

        let mut expense = new_expense(dec!(10), ann, &[]);
        assert!(matches!(store.add_expense(expense.clone()), Err(BillError::NoParticipants)));

        expense.participant_ids = vec![ben.id.clone(), ben.id.clone()];
        assert!(matches!(
            store.add_expense(expense.clone()),
            Err(BillError::DuplicateParticipant(_))
        ));

        expense.participant_ids = vec!["stranger".to_string()];
        assert!(matches!(
            store.add_expense(expense.clone()),
            Err(BillError::UnknownParticipant(_))
        ));

        let negative = new_expense(dec!(-1), ann, &[ben]);
        assert!(matches!(store.add_expense(negative), Err(BillError::Money(_))));

        let mut unnamed = new_expense(dec!(1), ann, &[ben]);
        unnamed.name = "   ".to_string();
        assert!(matches!(store.add_expense(unnamed), Err(BillError::EmptyName(_))));

        let added = store.add_expense(new_expense(dec!(10), ann, &[ann, ben])).unwrap();
        assert!(added.id.starts_with("expense-"));
        assert_eq!(store.current_bill().unwrap().expenses, vec![added]);
    }

    #[test]
    fn expenses_that_would_overflow_the_bill_are_refused() {
        let (mut store, people) = store_with(&["Ann", "Ben"]);
        let (ann, ben) = (&people[0], &people[1]);
        let largest = crate::money::parse_currency_input(&"9".repeat(26)).unwrap();

        let mut added = 0;
        let refused = loop {
            match store.add_expense(new_expense(largest, ann, &[ann, ben])) {
                Ok(_) => added += 1,
                Err(err) => break err,
            }
        };
        assert!(matches!(refused, BillError::Money(MoneyError::Overflow)));
        assert!(added > 0);
        assert_eq!(store.current_bill().unwrap().expenses.len(), added);

        // Whatever was accepted can still be settled.
        let report = calculate_settlement(store.current_bill().unwrap()).unwrap();
        assert_eq!(report.settlements.len(), 2);
    }

    #[test]
    fn removing_a_payer_reassigns_to_first_remaining_person() {
        let (mut store, people) = store_with(&["Ann", "Ben", "Cat"]);
        let (ann, ben, cat) = (&people[0], &people[1], &people[2]);
        let paid_by_ann = store.add_expense(new_expense(dec!(90), ann, &[ann, ben, cat])).unwrap();
        let only_ann = store.add_expense(new_expense(dec!(20), ben, &[ann])).unwrap();

        let removal = store.remove_person(&ann.id).unwrap();
        assert_eq!(removal.person, *ann);
        assert_eq!(removal.new_payer.as_deref(), Some(ben.id.as_str()));
        assert_eq!(removal.reassigned_expenses, vec![paid_by_ann.id.clone()]);
        assert_eq!(removal.emptied_expenses, vec![only_ann.id.clone()]);

        let bill = store.current_bill().unwrap();
        assert_eq!(bill.people.len(), 2);
        assert_eq!(bill.expenses[0].payer_id, ben.id);
        assert_eq!(bill.expenses[0].participant_ids, vec![ben.id.clone(), cat.id.clone()]);
        assert!(bill.expenses[1].participant_ids.is_empty());

        // The emptied expense drops out of the balances.
        let report = calculate_settlement(bill).unwrap();
        let owed: Vec<_> = report.settlements.iter().map(|s| s.amount_owed).collect();
        assert_eq!(owed, vec![dec!(45), dec!(-45)]);
    }

    #[test]
    fn removing_the_last_person_clears_the_payer() {
        let (mut store, people) = store_with(&["Ann"]);
        let ann = &people[0];
        store.add_expense(new_expense(dec!(5), ann, &[ann])).unwrap();
        let removal = store.remove_person(&ann.id).unwrap();
        assert_eq!(removal.new_payer, None);
        assert_eq!(store.current_bill().unwrap().expenses[0].payer_id, "");
        assert!(matches!(
            store.remove_person(&ann.id),
            Err(BillError::PersonNotFound(_))
        ));
    }

    #[test]
    fn removes_expenses_by_id() {
        let (mut store, people) = store_with(&["Ann"]);
        let ann = &people[0];
        let expense = store.add_expense(new_expense(dec!(5), ann, &[ann])).unwrap();
        assert_eq!(store.remove_expense(&expense.id).unwrap(), expense);
        assert!(matches!(
            store.remove_expense(&expense.id),
            Err(BillError::ExpenseNotFound(_))
        ));
    }

    #[test]
    fn saving_upserts_in_place() {
        let mut store = BillStore::default();
        let first = store.create_bill("First").unwrap().id.clone();
        store.save_current_bill_to_list().unwrap();
        store.create_bill("Second").unwrap();
        store.save_current_bill_to_list().unwrap();

        store.open_bill(&first).unwrap();
        store.add_person("Ann").unwrap();
        store.save_current_bill_to_list().unwrap();

        let names: Vec<_> = store.bills().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert_eq!(store.bills()[0].people.len(), 1);
    }

    #[test]
    fn deleting_the_current_bill_clears_it() {
        let mut store = BillStore::default();
        let id = store.create_bill("Trip").unwrap().id.clone();
        store.save_current_bill_to_list().unwrap();
        store.delete_bill(&id).unwrap();
        assert!(store.current_bill().is_none());
        assert!(store.bills().is_empty());
        assert!(matches!(store.delete_bill(&id), Err(BillError::BillNotFound(_))));
    }

    #[test]
    fn blank_bank_info_is_cleared() {
        let (mut store, _) = store_with(&[]);
        let bill = store
            .update_bank_info(Some("VCB".into()), Some("0123".into()))
            .unwrap();
        assert_eq!(bill.bank_account(), Some(("VCB", "0123")));
        let bill = store.update_bank_info(Some(String::new()), None).unwrap();
        assert_eq!(bill.bank_code, None);
        assert_eq!(bill.account_number, None);
    }

    #[test]
    fn snapshot_restores_state() {
        let (mut store, _) = store_with(&["Ann"]);
        store.save_current_bill_to_list().unwrap();
        let restored = BillStore::from_snapshot(store.snapshot());
        assert_eq!(restored.snapshot(), store.snapshot());
        assert!(restored.current_bill().is_some());

        let mut cleared = BillStore::from_snapshot(store.snapshot());
        cleared.clear_current_bill();
        cleared.set_current_bill(None);
        assert!(cleared.current_bill().is_none());
        assert_eq!(cleared.bills().len(), 1);
    }
}
