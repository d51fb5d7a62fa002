use std::sync::Arc;

use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::balance::{bill_total, calculate_settlement};
use crate::config::Config;
use crate::details::{calculate_all_person_details, calculate_person_details};
use crate::error::{BillError, StorageError};
use crate::exchange::optimize_transactions;
use crate::money::{format_currency, parse_currency_input, MoneyError};
use crate::qr::{account_qr_url, transfer_qr_url, QrVariant};
use crate::schemas::{Bill, NewExpense, PersonDetails, PersonId, Settlement, SettlementReport};
use crate::share::{decode_bill, generate_share_url};
use crate::storage::{BillStorage, MemoryStorage};
use crate::store::BillStore;

pub struct AppState {
    pub store: RwLock<BillStore>,
    pub storage: Arc<dyn BillStorage>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: BillStore, storage: Arc<dyn BillStorage>, config: Config) -> Self {
        AppState {
            store: RwLock::new(store),
            storage,
            config,
        }
    }

    pub fn in_memory(config: Config) -> Self {
        Self::new(BillStore::default(), Arc::new(MemoryStorage::default()), config)
    }

    /// Applies `change` to a copy of the store and swaps it in once storage has the result.
    ///
    /// A failed change or a failed save leaves the live store untouched.
    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut BillStore) -> Result<T, BillError>,
    ) -> Result<T, BillError> {
        let mut store = self.store.write().await;
        let mut draft = store.clone();
        let outcome = change(&mut draft)?;

        let storage = Arc::clone(&self.storage);
        let snapshot = draft.snapshot();
        web::block(move || storage.save(&snapshot))
            .await
            .map_err(StorageError::from)??;

        *store = draft;
        Ok(outcome)
    }
}

type HandlerResult = Result<HttpResponse, BillError>;

#[derive(Deserialize, Serialize)]
struct NameJson {
    name: String,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpenseForm {
    name: String,
    /// Free text as typed, e.g. `120.000`.
    amount: String,
    payer_id: PersonId,
    participant_ids: Vec<PersonId>,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct BankInfoJson {
    bank_code: Option<String>,
    account_number: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BillListing {
    id: String,
    name: String,
    date: DateTime<Utc>,
    total: Decimal,
    people: usize,
    expenses: usize,
}

#[derive(Deserialize, Serialize)]
struct SharedQuery {
    data: String,
}

#[derive(Deserialize)]
struct QrQuery {
    variant: Option<QrVariant>,
}

#[derive(Deserialize, Serialize)]
struct UrlJson {
    url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferQr {
    person_id: PersonId,
    amount: Decimal,
    url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SharedBill {
    bill: Bill,
    report: SettlementReport,
    person_details: IndexMap<PersonId, PersonDetails>,
}

#[post("/settlement")]
async fn settle_bill(bill: web::Json<Bill>) -> HandlerResult {
    Ok(HttpResponse::Ok().json(calculate_settlement(&bill)?))
}

#[post("/settlement/transactions")]
async fn settle_balances(settlements: web::Json<Vec<Settlement>>) -> HttpResponse {
    HttpResponse::Ok().json(optimize_transactions(&settlements))
}

#[post("/settlement/details")]
async fn bill_details(bill: web::Json<Bill>) -> HandlerResult {
    Ok(HttpResponse::Ok().json(calculate_all_person_details(&bill)?))
}

#[get("/bills")]
async fn list_bills(state: web::Data<AppState>) -> HandlerResult {
    let store = state.store.read().await;
    let listings = store
        .bills()
        .iter()
        .map(|bill| {
            Ok(BillListing {
                id: bill.id.clone(),
                name: bill.name.clone(),
                date: bill.date,
                total: bill_total(bill)?,
                people: bill.people.len(),
                expenses: bill.expenses.len(),
            })
        })
        .collect::<Result<Vec<_>, MoneyError>>()?;
    Ok(HttpResponse::Ok().json(listings))
}

#[put("/bills/current")]
async fn create_bill(state: web::Data<AppState>, json: web::Json<NameJson>) -> HandlerResult {
    let bill = state
        .commit(|store| store.create_bill(&json.name).cloned())
        .await?;
    tracing::info!(bill = %bill.id, name = %bill.name, "bill started");
    Ok(HttpResponse::Created().json(bill))
}

#[get("/bills/current")]
async fn current_bill(state: web::Data<AppState>) -> HandlerResult {
    let store = state.store.read().await;
    let bill = store.current_bill().ok_or(BillError::NoCurrentBill)?;
    Ok(HttpResponse::Ok().json(bill))
}

#[delete("/bills/current")]
async fn clear_current_bill(state: web::Data<AppState>) -> HandlerResult {
    state
        .commit(|store| {
            store.clear_current_bill();
            Ok(())
        })
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/bills/current/save")]
async fn save_current_bill(state: web::Data<AppState>) -> HandlerResult {
    let bill = state
        .commit(|store| store.save_current_bill_to_list().cloned())
        .await?;
    tracing::info!(bill = %bill.id, "bill saved");
    Ok(HttpResponse::Ok().json(bill))
}

#[post("/bills/current/people")]
async fn add_person(state: web::Data<AppState>, json: web::Json<NameJson>) -> HandlerResult {
    let person = state.commit(|store| store.add_person(&json.name)).await?;
    Ok(HttpResponse::Created().json(person))
}

#[delete("/bills/current/people/{id}")]
async fn remove_person(state: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let removal = state.commit(|store| store.remove_person(&id)).await?;
    Ok(HttpResponse::Ok().json(removal))
}

#[post("/bills/current/expenses")]
async fn add_expense(state: web::Data<AppState>, form: web::Json<ExpenseForm>) -> HandlerResult {
    let form = form.into_inner();
    let expense = NewExpense {
        name: form.name,
        amount: parse_currency_input(&form.amount)?,
        payer_id: form.payer_id,
        participant_ids: form.participant_ids,
    };
    let expense = state.commit(|store| store.add_expense(expense)).await?;
    Ok(HttpResponse::Created().json(expense))
}

#[delete("/bills/current/expenses/{id}")]
async fn remove_expense(state: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let expense = state.commit(|store| store.remove_expense(&id)).await?;
    Ok(HttpResponse::Ok().json(expense))
}

#[put("/bills/current/bank")]
async fn update_bank_info(
    state: web::Data<AppState>,
    json: web::Json<BankInfoJson>,
) -> HandlerResult {
    let json = json.into_inner();
    let bill = state
        .commit(|store| {
            store
                .update_bank_info(json.bank_code, json.account_number)
                .cloned()
        })
        .await?;
    Ok(HttpResponse::Ok().json(bill))
}

#[get("/bills/current/settlement")]
async fn current_settlement(state: web::Data<AppState>) -> HandlerResult {
    let store = state.store.read().await;
    let bill = store.current_bill().ok_or(BillError::NoCurrentBill)?;
    Ok(HttpResponse::Ok().json(calculate_settlement(bill)?))
}

fn render_summary(bill: &Bill, report: &SettlementReport) -> String {
    let mut lines = vec![
        bill.name.clone(),
        format!("Total: {}", format_currency(report.total)),
        format!("Per person: {}", format_currency(report.per_person)),
    ];
    for settlement in &report.settlements {
        let sign = if settlement.amount_owed > Decimal::ZERO { "+" } else { "" };
        lines.push(format!(
            "{}: {sign}{}",
            settlement.person_name,
            format_currency(settlement.amount_owed)
        ));
    }
    for transaction in &report.transactions {
        lines.push(format!(
            "{} -> {}: {}",
            transaction.from,
            transaction.to,
            format_currency(transaction.amount)
        ));
    }
    lines.join("\n")
}

#[get("/bills/current/summary")]
async fn current_summary(state: web::Data<AppState>) -> HandlerResult {
    let store = state.store.read().await;
    let bill = store.current_bill().ok_or(BillError::NoCurrentBill)?;
    let summary = render_summary(bill, &calculate_settlement(bill)?);
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(summary))
}

#[get("/bills/current/people/{id}/details")]
async fn person_details(state: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let store = state.store.read().await;
    let bill = store.current_bill().ok_or(BillError::NoCurrentBill)?;
    if bill.person(&id).is_none() {
        return Err(BillError::PersonNotFound(id.into_inner()));
    }
    Ok(HttpResponse::Ok().json(calculate_person_details(&id, bill)?))
}

#[get("/bills/current/people/{id}/qr")]
async fn person_transfer_qr(state: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let store = state.store.read().await;
    let bill = store.current_bill().ok_or(BillError::NoCurrentBill)?;
    let (bank_code, account_number) = bill.bank_account().ok_or(BillError::MissingBankInfo)?;
    let report = calculate_settlement(bill)?;
    let settlement = report
        .settlements
        .iter()
        .find(|settlement| settlement.person_id == *id)
        .ok_or_else(|| BillError::PersonNotFound(id.to_string()))?;
    if settlement.amount_owed >= Decimal::ZERO {
        return Err(BillError::NotADebtor(settlement.person_id.clone()));
    }
    let url = transfer_qr_url(
        &state.config.qr_base_url,
        bank_code,
        account_number,
        settlement.amount_owed,
        &settlement.person_name,
        &bill.name,
    );
    Ok(HttpResponse::Ok().json(TransferQr {
        person_id: settlement.person_id.clone(),
        amount: settlement.amount_owed.abs(),
        url,
    }))
}

#[get("/bills/current/qr")]
async fn account_qr(state: web::Data<AppState>, query: web::Query<QrQuery>) -> HandlerResult {
    let store = state.store.read().await;
    let bill = store.current_bill().ok_or(BillError::NoCurrentBill)?;
    let (bank_code, account_number) = bill.bank_account().ok_or(BillError::MissingBankInfo)?;
    let url = account_qr_url(
        &state.config.qr_base_url,
        bank_code,
        account_number,
        query.variant.unwrap_or_default(),
    );
    Ok(HttpResponse::Ok().json(UrlJson { url }))
}

#[get("/bills/current/share")]
async fn share_current_bill(state: web::Data<AppState>) -> HandlerResult {
    let store = state.store.read().await;
    let bill = store.current_bill().ok_or(BillError::NoCurrentBill)?;
    let url = generate_share_url(&state.config.public_url, bill)?;
    Ok(HttpResponse::Ok().json(UrlJson { url }))
}

#[post("/bills/{id}/open")]
async fn open_bill(state: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let bill = state.commit(|store| store.open_bill(&id).cloned()).await?;
    Ok(HttpResponse::Ok().json(bill))
}

#[delete("/bills/{id}")]
async fn delete_bill(state: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    state.commit(|store| store.delete_bill(&id)).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/shared")]
async fn view_shared_bill(query: web::Query<SharedQuery>) -> HandlerResult {
    let bill = decode_bill(&query.data)?;
    let report = calculate_settlement(&bill)?;
    let details = calculate_all_person_details(&bill)?;
    Ok(HttpResponse::Ok().json(SharedBill {
        bill,
        report,
        person_details: details,
    }))
}

/// Opens a shared bill as the current one so it can be edited.
#[post("/shared/import")]
async fn import_shared_bill(
    state: web::Data<AppState>,
    query: web::Query<SharedQuery>,
) -> HandlerResult {
    let bill = decode_bill(&query.data)?;
    state
        .commit(|store| {
            store.set_current_bill(Some(bill.clone()));
            Ok(())
        })
        .await?;
    tracing::info!(bill = %bill.id, "shared bill imported");
    Ok(HttpResponse::Ok().json(bill))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // `/bills/current...` must be registered before `/bills/{id}...`.
    cfg.service(settle_bill)
        .service(settle_balances)
        .service(bill_details)
        .service(list_bills)
        .service(create_bill)
        .service(current_bill)
        .service(clear_current_bill)
        .service(save_current_bill)
        .service(add_person)
        .service(remove_person)
        .service(add_expense)
        .service(remove_expense)
        .service(update_bank_info)
        .service(current_settlement)
        .service(current_summary)
        .service(person_details)
        .service(person_transfer_qr)
        .service(account_qr)
        .service(share_current_bill)
        .service(open_bill)
        .service(delete_bill)
        .service(view_shared_bill)
        .service(import_shared_bill);
}
