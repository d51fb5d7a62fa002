use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::money::{round_half_up, ExactAmount, MoneyError};
use crate::schemas::{Bill, PaidExpense, ParticipatedExpense, PersonDetails, PersonId};

/// Itemizes what a person paid for and what they took part in, in expense order.
///
/// Unlike the balance calculation, nothing is netted here: a payer who also participates
/// shows up in both lists, and each share is rounded on its own.
pub fn calculate_person_details(
    person_id: &str,
    bill: &Bill,
) -> Result<PersonDetails, MoneyError> {
    let mut paid_expenses = Vec::new();
    let mut participated_expenses = Vec::new();
    let mut total_paid = Decimal::ZERO;

    for expense in &bill.expenses {
        if expense.payer_id == person_id {
            total_paid = total_paid
                .checked_add(expense.amount)
                .ok_or(MoneyError::Overflow)?;
            paid_expenses.push(PaidExpense {
                expense: expense.clone(),
                amount: expense.amount,
            });
        }

        if expense.participant_ids.iter().any(|id| id == person_id) {
            // Being listed means the participant list has at least one entry.
            if let Some(share) = ExactAmount::share(expense.amount, expense.participant_ids.len()) {
                participated_expenses.push(ParticipatedExpense {
                    expense: expense.clone(),
                    share: share.round_half_up()?,
                });
            }
        }
    }

    Ok(PersonDetails {
        total_paid: round_half_up(total_paid),
        paid_expenses,
        participated_expenses,
    })
}

/// Details for every person of the bill, keyed by person id in people order.
pub fn calculate_all_person_details(
    bill: &Bill,
) -> Result<IndexMap<PersonId, PersonDetails>, MoneyError> {
    bill.people
        .iter()
        .map(|person| Ok((person.id.clone(), calculate_person_details(&person.id, bill)?)))
        .collect()
}
