use crate::money::round_half_up;
use crate::schemas::{Settlement, Transaction};
use rust_decimal::Decimal;

#[derive(Clone, Debug)]
struct PersonalBalance {
    name: String,
    remaining: Decimal,
}

// Splits settlements into debtors and creditors, both in input order. Balanced people are dropped.
fn partition(settlements: &[Settlement]) -> (Vec<PersonalBalance>, Vec<PersonalBalance>) {
    let mut debtors = Vec::new();
    let mut creditors = Vec::new();

    for settlement in settlements {
        let person = PersonalBalance {
            name: settlement.person_name.clone(),
            remaining: settlement.amount_owed.abs(),
        };
        if settlement.amount_owed < Decimal::ZERO {
            debtors.push(person);
        } else if settlement.amount_owed > Decimal::ZERO {
            creditors.push(person);
        }
    }
    (debtors, creditors)
}

/// Greedily matches debtors with creditors in listing order.
///
/// Produces at most `debtors + creditors - 1` transfers. When the balances do not sum to
/// zero, whatever is left once one side runs out is dropped.
pub fn optimize_transactions(settlements: &[Settlement]) -> Vec<Transaction> {
    let (mut debtors, mut creditors) = partition(settlements);
    let mut transactions = Vec::new();

    let (mut i, mut j) = (0, 0);
    while i < debtors.len() && j < creditors.len() {
        let debtor = &mut debtors[i];
        let creditor = &mut creditors[j];
        let amount = debtor.remaining.min(creditor.remaining);

        if amount > Decimal::ZERO {
            transactions.push(Transaction {
                from: debtor.name.clone(),
                to: creditor.name.clone(),
                amount: round_half_up(amount),
            });
        }

        debtor.remaining -= amount;
        creditor.remaining -= amount;

        if debtor.remaining.is_zero() {
            i += 1;
        }
        if creditor.remaining.is_zero() {
            j += 1;
        }
    }

    if i < debtors.len() || j < creditors.len() {
        tracing::debug!(
            unmatched_debtors = debtors.len() - i,
            unmatched_creditors = creditors.len() - j,
            "settlements do not balance, dropping residual"
        );
    }
    transactions
}
