use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::exchange::optimize_transactions;
use crate::money::{checked_sum, round_half_up, ExactAmount, MoneyError};
use crate::schemas::{Bill, PersonId, Settlement, SettlementReport};

pub type Balance = HashMap<PersonId, ExactAmount>;

/// Net balance per person id, unrounded. Every person of the bill starts at zero.
pub fn compute_balances(bill: &Bill) -> Result<Balance, MoneyError> {
    let mut balance: Balance = bill
        .people
        .iter()
        .map(|person| (person.id.clone(), ExactAmount::zero()))
        .collect();
    for expense in &bill.expenses {
        // An expense nobody participates in has no one to charge.
        let Some(share) = ExactAmount::share(expense.amount, expense.participant_ids.len()) else {
            continue;
        };
        balance
            .entry(expense.payer_id.clone())
            .or_default()
            .try_add(&ExactAmount::whole(expense.amount))?;
        for participant in &expense.participant_ids {
            balance.entry(participant.clone()).or_default().try_sub(&share)?;
        }
    }
    Ok(balance)
}

pub fn bill_total(bill: &Bill) -> Result<Decimal, MoneyError> {
    let total = checked_sum(bill.expenses.iter().map(|expense| expense.amount))?;
    Ok(round_half_up(total))
}

pub fn calculate_settlement(bill: &Bill) -> Result<SettlementReport, MoneyError> {
    if bill.people.is_empty() || bill.expenses.is_empty() {
        return Ok(SettlementReport::empty());
    }

    let total = checked_sum(bill.expenses.iter().map(|expense| expense.amount))?;
    let per_person = match ExactAmount::share(total, bill.people.len()) {
        Some(share) => share.round_half_up()?,
        None => Decimal::ZERO,
    };

    let balance = compute_balances(bill)?;
    let settlements = bill
        .people
        .iter()
        .map(|person| {
            let amount_owed = match balance.get(&person.id) {
                Some(amount) => amount.round_half_up()?,
                None => Decimal::ZERO,
            };
            Ok(Settlement {
                person_id: person.id.clone(),
                person_name: person.name.clone(),
                amount_owed,
            })
        })
        .collect::<Result<Vec<_>, MoneyError>>()?;
    let transactions = optimize_transactions(&settlements);

    tracing::debug!(
        bill = %bill.id,
        people = bill.people.len(),
        expenses = bill.expenses.len(),
        transactions = transactions.len(),
        "settlement calculated"
    );

    Ok(SettlementReport {
        settlements,
        transactions,
        total: round_half_up(total),
        per_person,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schemas::{Expense, Person, Transaction};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    pub(crate) fn person(id: &str) -> Person {
        Person {
            id: id.to_string(),
            name: id.to_string(),
        }
    }

    pub(crate) fn expense(
        id: &str,
        amount: Decimal,
        payer: &str,
        participants: &[&str],
    ) -> Expense {
        Expense {
            id: id.to_string(),
            name: id.to_string(),
            amount,
            payer_id: payer.to_string(),
            participant_ids: participants.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub(crate) fn bill(people: &[&str], expenses: Vec<Expense>) -> Bill {
        Bill {
            id: "bill".to_string(),
            name: "Trip".to_string(),
            date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            people: people.iter().map(|id| person(id)).collect(),
            expenses,
            bank_code: None,
            account_number: None,
        }
    }

    fn owed(report: &SettlementReport) -> Vec<(&str, Decimal)> {
        report
            .settlements
            .iter()
            .map(|s| (s.person_name.as_str(), s.amount_owed))
            .collect()
    }

    #[test]
    fn two_people_one_expense() {
        let bill = bill(
            &["Alice", "Bob"],
            vec![expense("dinner", dec!(100), "Alice", &["Alice", "Bob"])],
        );
        let report = calculate_settlement(&bill).unwrap();
        assert_eq!(owed(&report), vec![("Alice", dec!(50)), ("Bob", dec!(-50))]);
        assert_eq!(
            report.transactions,
            vec![Transaction {
                from: "Bob".into(),
                to: "Alice".into(),
                amount: dec!(50)
            }]
        );
        assert_eq!(report.total, dec!(100));
        assert_eq!(report.per_person, dec!(50));
    }

    #[test]
    fn three_way_split() {
        let bill = bill(&["A", "B", "C"], vec![expense("taxi", dec!(90), "A", &["A", "B", "C"])]);
        let report = calculate_settlement(&bill).unwrap();
        assert_eq!(
            owed(&report),
            vec![("A", dec!(60)), ("B", dec!(-30)), ("C", dec!(-30))]
        );
        assert_eq!(report.transactions.len(), 2);
        assert_eq!(report.transactions[0].from, "B");
        assert_eq!(report.transactions[1].from, "C");
        assert!(report.transactions.iter().all(|t| t.to == "A" && t.amount == dec!(30)));
    }

    #[test]
    fn solo_self_paid_expense_nets_to_zero() {
        let bill = bill(&["A", "B"], vec![expense("snack", dec!(40), "A", &["A"])]);
        let report = calculate_settlement(&bill).unwrap();
        assert_eq!(owed(&report), vec![("A", dec!(0)), ("B", dec!(0))]);
        assert!(report.transactions.is_empty());
        assert_eq!(report.total, dec!(40));
    }

    #[test]
    fn empty_bills_short_circuit() {
        let no_people = bill(&[], vec![expense("x", dec!(10), "A", &["A"])]);
        assert_eq!(calculate_settlement(&no_people).unwrap(), SettlementReport::empty());

        let no_expenses = bill(&["A", "B"], vec![]);
        let report = calculate_settlement(&no_expenses).unwrap();
        assert_eq!(report, SettlementReport::empty());
        assert_eq!(serde_json::to_value(&report).unwrap()["total"], "0");
    }

    #[test]
    fn expense_without_participants_is_skipped() {
        let bill = bill(
            &["A", "B"],
            vec![
                expense("ghost", dec!(500), "A", &[]),
                expense("lunch", dec!(20), "B", &["A", "B"]),
            ],
        );
        let report = calculate_settlement(&bill).unwrap();
        assert_eq!(owed(&report), vec![("A", dec!(-10)), ("B", dec!(10))]);
        // Still counted in the informational total.
        assert_eq!(report.total, dec!(520));
        assert_eq!(report.per_person, dec!(260));
    }

    #[test]
    fn rounding_happens_once_at_the_end() {
        // Each third is 33.33..., three of them would round to 99 if rounded eagerly.
        let bill = bill(
            &["A", "B", "C"],
            vec![
                expense("a", dec!(100), "A", &["A", "B", "C"]),
                expense("b", dec!(100), "A", &["A", "B", "C"]),
                expense("c", dec!(100), "A", &["A", "B", "C"]),
            ],
        );
        let report = calculate_settlement(&bill).unwrap();
        assert_eq!(
            owed(&report),
            vec![("A", dec!(200)), ("B", dec!(-100)), ("C", dec!(-100))]
        );
    }

    #[test]
    fn settlements_follow_people_order() {
        let bill = bill(
            &["Zed", "Amy", "Max"],
            vec![expense("x", dec!(30), "Max", &["Zed", "Amy", "Max"])],
        );
        let names: Vec<_> = calculate_settlement(&bill)
            .unwrap()
            .settlements
            .into_iter()
            .map(|s| s.person_id)
            .collect();
        assert_eq!(names, vec!["Zed", "Amy", "Max"]);
    }

    #[test]
    fn per_person_rounds_half_up() {
        let bill = bill(&["A", "B"], vec![expense("x", dec!(101), "A", &["A", "B"])]);
        assert_eq!(calculate_settlement(&bill).unwrap().per_person, dec!(51));
    }

    #[test]
    fn oversized_bills_fail_instead_of_panicking() {
        let largest = crate::money::parse_currency_input(&"9".repeat(26)).unwrap();
        let expenses = (0..1000)
            .map(|index| expense(&format!("e{index}"), largest, "A", &["A", "B"]))
            .collect();
        let bill = bill(&["A", "B"], expenses);
        assert_eq!(calculate_settlement(&bill), Err(MoneyError::Overflow));
        assert_eq!(bill_total(&bill), Err(MoneyError::Overflow));
        assert!(compute_balances(&bill).is_err());
    }

    #[test]
    fn bill_total_rounds_the_exact_sum() {
        let bill = bill(
            &["A"],
            vec![
                expense("x", dec!(10.25), "A", &["A"]),
                expense("y", dec!(10.25), "A", &["A"]),
            ],
        );
        assert_eq!(bill_total(&bill), Ok(dec!(21)));
    }

    fn arbitrary_bill() -> impl Strategy<Value = Bill> {
        (1usize..=7).prop_flat_map(|people| {
            let raw_expense = (0u64..=1_000_000, 0..people, 0u16..(1u16 << people));
            prop::collection::vec(raw_expense, 0..=25).prop_map(move |raw| {
                let ids: Vec<String> = (0..people).map(|i| format!("p{i}")).collect();
                let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
                let expenses = raw
                    .into_iter()
                    .enumerate()
                    .map(|(index, (amount, payer, mask))| {
                        let participants: Vec<&str> = (0..people)
                            .filter(|i| mask & (1 << i) != 0)
                            .map(|i| id_refs[i])
                            .collect();
                        expense(
                            &format!("e{index}"),
                            Decimal::from(amount),
                            id_refs[payer],
                            &participants,
                        )
                    })
                    .collect();
                bill(&id_refs, expenses)
            })
        })
    }

    proptest! {
        #[test]
        fn unrounded_balances_sum_to_zero(bill in arbitrary_bill()) {
            let mut sum = ExactAmount::zero();
            for amount in compute_balances(&bill).unwrap().values() {
                sum.try_add(amount).unwrap();
            }
            prop_assert!(sum.is_zero());
        }

        #[test]
        fn rounded_settlements_stay_within_bound(bill in arbitrary_bill()) {
            let report = calculate_settlement(&bill).unwrap();
            let sum: Decimal = report.settlements.iter().map(|s| s.amount_owed).sum();
            let bound = Decimal::from(bill.people.len().saturating_sub(1));
            prop_assert!(sum.abs() <= bound);
        }

        #[test]
        fn calculation_is_idempotent(bill in arbitrary_bill()) {
            prop_assert_eq!(
                calculate_settlement(&bill).unwrap(),
                calculate_settlement(&bill).unwrap()
            );
        }
    }
}
