use carteira_core::domain::order::{GroupStatus, LegSubmission};
use carteira_core::domain::portfolio::{Operation, PortfolioSnapshot, PortfolioSummary};
use carteira_core::domain::recommendation::Candidate;
use carteira_core::workflow::{Alert, BuyTicket, Severity, WorkflowObserver};
use chrono::NaiveDate;

/// Prints dialog events to the terminal.
pub struct CliObserver {
    pub today: NaiveDate,
}

impl WorkflowObserver for CliObserver {
    fn on_alert(&self, alert: &Alert) {
        let tag = match alert.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        eprintln!("[{tag}] {}", alert.text);
    }

    fn on_status(&self, status: &GroupStatus) {
        print_status(status);
    }

    fn on_reconciled(&self, snapshot: &PortfolioSnapshot) {
        println!();
        println!("Portfolio refreshed:");
        print_operations(&snapshot.operations, self.today);
        print_summary(&snapshot.summary, None);
    }

    fn on_close(&self) {
        println!("All legs executed; dialog closed.");
    }
}

fn money(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

pub fn print_candidates(candidates: &[Candidate]) {
    if candidates.is_empty() {
        println!("No candidates.");
        return;
    }
    println!(
        "{:<8} {:<5} {:<8} {:>10} {:>10} {:>7}",
        "TICKER", "SIDE", "ORIGIN", "REF", "TARGET", "PROB%"
    );
    for c in candidates {
        println!(
            "{:<8} {:<5} {:<8} {:>10} {:>10} {:>7}",
            c.ticker,
            c.side.as_str(),
            format!("{:?}", c.origin).to_uppercase(),
            money(c.reference_price),
            money(c.suggested_target),
            c.probability_pct
                .map(|p| format!("{p:.1}"))
                .unwrap_or_else(|| "-".to_string()),
        );
    }
}

pub fn print_operations(operations: &[Operation], today: NaiveDate) {
    if operations.is_empty() {
        println!("No operations.");
        return;
    }
    println!(
        "{:>6} {:<8} {:<10} {:>8} {:>10} {:>12} {:>6} {:<6}",
        "ID", "TICKER", "BOUGHT", "QTY", "PRICE", "TOTAL", "DAYS", "STATE"
    );
    for op in operations {
        println!(
            "{:>6} {:<8} {:<10} {:>8} {:>10} {:>12} {:>6} {:<6}",
            op.id,
            op.ticker().unwrap_or_else(|| "?".to_string()),
            op.data_compra
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            op.quantidade
                .map(|q| format!("{q}"))
                .unwrap_or_else(|| "-".to_string()),
            money(op.preco_unitario),
            money(op.total_cost()),
            op.days_held(today)
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            if op.is_open() { "open" } else { "closed" },
        );
    }
}

pub fn print_summary(summary: &PortfolioSummary, max_buy_value: Option<f64>) {
    println!(
        "equity={} allowed%={} available={} positioned={} realized={}",
        money(summary.patrimonio),
        money(summary.percentual_patrimonio),
        money(summary.valor_disponivel),
        money(summary.posicionado),
        money(summary.realizadas),
    );
    if let Some(max) = max_buy_value {
        println!("max per new buy={max:.2}");
    }
}

pub fn print_ticket(ticket: &BuyTicket, estimated: Option<f64>, max: Option<f64>) {
    println!(
        "{} {} via {} | tp={} | ref={}",
        ticket.candidate.side.as_str(),
        ticket.candidate.ticker,
        ticket.execution.wire_name(),
        money(ticket.target_price),
        money(ticket.reference_price()),
    );
    for leg in &ticket.legs {
        println!("  {:<8} {:>10}", leg.symbol, leg.quantity);
    }
    println!("estimated total={} max={}", money(estimated), money(max));
}

pub fn print_submission(legs: &[LegSubmission]) {
    for leg in legs {
        println!(
            "  {:<8} {:<9} ticket={}",
            leg.symbol,
            if leg.accepted { "sent" } else { "rejected" },
            leg.order_ticket
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
}

pub fn print_status(status: &GroupStatus) {
    let done = status.legs.iter().filter(|l| l.executed).count();
    println!(
        "status: {done}/{} legs executed{}",
        status.legs.len(),
        if status.executed_all { " (complete)" } else { "" }
    );
    for leg in &status.legs {
        println!(
            "  {:<8} {:<8} vol={} avg={}",
            leg.symbol,
            if leg.executed { "filled" } else { "pending" },
            leg.executed_volume
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            money(leg.average_price),
        );
    }
    if let Some(op) = status.created_operation_id {
        println!("  operation created: {op}");
    }
}
