use std::fmt::Write;

use model::{EmailPayload, Transaction, TransactionItem};

/// A rendered notification, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Formats an amount in rupiah with dot thousand separators: `Rp 45.000`.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}Rp {grouped}")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn render(payload: EmailPayload, transaction: &Transaction, items: &[TransactionItem]) -> Email {
    let (subject, headline) = match payload {
        EmailPayload::Success => (
            format!("Payment received for order {}", transaction.id),
            "Thank you, your payment was successful. Your order is on its way to the kitchen.",
        ),
        EmailPayload::Failure => (
            format!("Payment failed for order {}", transaction.id),
            "Unfortunately your payment could not be completed.",
        ),
    };

    let mut text = String::new();
    let mut rows = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(text, "Hi {},", transaction.customer_name);
    let _ = writeln!(text);
    let _ = writeln!(text, "{headline}");
    let _ = writeln!(text);
    let _ = writeln!(text, "Order: {}", transaction.id);
    let _ = writeln!(text, "Table: {}", transaction.table_code);
    let _ = writeln!(text, "Status: {}", transaction.status);
    let _ = writeln!(text);
    for item in items {
        let _ = writeln!(
            text,
            "- {} x{}  {}",
            item.product_name,
            item.qty,
            format_rupiah(item.amount)
        );
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&item.product_name),
            item.qty,
            format_rupiah(item.amount)
        );
    }
    let _ = writeln!(text);
    let _ = writeln!(text, "Total: {}", format_rupiah(transaction.total_amount));

    let html = format!(
        "<p>Hi {name},</p><p>{headline}</p>\
         <p>Order: <b>{id}</b><br>Table: {table}<br>Status: {status}</p>\
         <table><tr><th>Item</th><th>Qty</th><th>Amount</th></tr>{rows}</table>\
         <p><b>Total: {total}</b></p>",
        name = escape_html(&transaction.customer_name),
        id = transaction.id,
        table = escape_html(&transaction.table_code),
        status = transaction.status,
        total = format_rupiah(transaction.total_amount),
    );

    Email {
        subject,
        text,
        html,
    }
}
