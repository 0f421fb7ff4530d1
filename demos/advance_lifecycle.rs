//! Advance lifecycle example: issue, claim, return, settle

use advance_ledger::utils::MemoryStorage;
use advance_ledger::{
    CategoryAmounts, ExpenseCategory, IssueAdvanceParams, LedgerEngine,
    RecordTransportPaymentParams, Role, SubmitExpenseParams, SubmitReturnParams,
    TransportCompany, User,
};
use bigdecimal::BigDecimal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("💵 Advance Ledger - Lifecycle Example\n");

    let ledger = LedgerEngine::new(MemoryStorage::new());

    let admin = User::new(
        "admin".to_string(),
        "Accounts Desk".to_string(),
        "accounts@example.com".to_string(),
        Role::Admin,
        "system".to_string(),
    );
    let staff = User::new(
        "staff-7".to_string(),
        "Field Officer".to_string(),
        "field@example.com".to_string(),
        Role::Staff,
        admin.id.clone(),
    );

    // 1. Issue an advance
    let advance = ledger
        .issue_advance(
            IssueAdvanceParams {
                staff_id: staff.id.clone(),
                staff_name: staff.name.clone(),
                amount: BigDecimal::from(5000),
                purpose: "Site visit".to_string(),
            },
            &admin,
        )
        .await?;
    println!("  ✓ Issued advance {} of ₹{}", advance.id, advance.amount);

    // 2. Staff claims travel costs
    let expense = ledger
        .submit_expense(
            SubmitExpenseParams {
                advance_id: advance.id.clone(),
                category: ExpenseCategory::OutStation,
                sub_category: "Bus".to_string(),
                amounts: CategoryAmounts::default()
                    .fare(BigDecimal::from(1500))
                    .breakfast(BigDecimal::from(500)),
                remarks: String::new(),
                bill_image: None,
            },
            &staff,
        )
        .await?;
    println!("  ✓ Submitted expense of ₹{}", expense.total_amount);

    let outcome = ledger.approve_expense(&expense.id, &admin).await?;
    println!(
        "  ✓ Approved expense, balance to settle ₹{}",
        outcome.advance.balance_to_settle
    );

    // 3. Staff hands back the unused cash
    let cash_return = ledger
        .submit_return(
            SubmitReturnParams {
                advance_id: advance.id.clone(),
                amount: outcome.advance.balance_to_settle.clone(),
                note: "Unused cash".to_string(),
            },
            &staff,
        )
        .await?;
    println!("  ✓ Submitted return of ₹{}", cash_return.amount);

    let outcome = ledger.approve_return(&cash_return.id, &admin).await?;
    println!(
        "  ✓ Approved return, advance settled: {}",
        outcome.settled
    );

    // 4. Transport payments sit beside the advance
    ledger
        .record_transport_payment(
            RecordTransportPaymentParams {
                staff_id: staff.id.clone(),
                staff_name: staff.name.clone(),
                company: TransportCompany::Canter,
                amount: BigDecimal::from(1200),
                details: "Godown to site".to_string(),
            },
            &staff,
        )
        .await?;

    let today = chrono::Utc::now().date_naive();
    for total in ledger.transport_company_totals(today, today).await? {
        println!(
            "  ✓ {:?}: {} payment(s), ₹{}",
            total.company, total.payment_count, total.total_amount
        );
    }

    // 5. Reports
    println!("\n📈 Staff Summary");
    let summary = ledger.staff_summary(&staff.id).await?;
    println!("  Issued:      ₹{}", summary.total_issued);
    println!("  Expenses:    ₹{}", summary.total_expenses);
    println!("  Returned:    ₹{}", summary.total_returned);
    println!("  Outstanding: ₹{}", summary.outstanding_balance);

    let integrity = ledger.validate_integrity().await?;
    if integrity.is_valid {
        println!("\n✅ Ledger integrity check passed");
    } else {
        println!("\n❌ Ledger integrity issues:");
        for issue in &integrity.issues {
            println!("  - {}", issue);
        }
    }

    Ok(())
}
