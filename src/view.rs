// src/view.rs
use crate::models::{Portfolio, Side, User};

/// Trade inputs echoed back into the form after a submit.
#[derive(Debug, Clone)]
pub struct TradeDraft {
    pub symbol: String,
    pub quantity: u32,
    pub side: Side,
}

impl Default for TradeDraft {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            quantity: 1,
            side: Side::Buy,
        }
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn money(amount: f64) -> String {
    let cents = (amount * 100.0).round() / 100.0;
    if cents < 0.0 {
        format!("-${:.2}", -cents)
    } else {
        format!("${:.2}", cents.abs())
    }
}

fn selected(side: Side, draft: &TradeDraft) -> &'static str {
    if side == draft.side {
        " selected"
    } else {
        ""
    }
}

pub fn render_page(
    user: &User,
    portfolio: &Portfolio,
    draft: &TradeDraft,
    messages: &[String],
) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Paper Trading Site</title></head>
<body>
<h1>Paper Trading Site</h1>
<form method="post" action="/">
<aside>
<h2>User Login</h2>
<label>Name <input type="text" name="name" value="{name}"></label>
<label>Email <input type="text" name="email" value="{email}"></label>
<label>Password <input type="password" name="password" value="{password}"></label>
<button type="submit" name="intent" value="refresh">Log in</button>
</aside>
<main>
<h2>Welcome, {name}</h2>
<p>Your email is {email}</p>
<p>Your balance is {balance}</p>
"#,
        name = escape(&user.name),
        email = escape(&user.email),
        password = escape(&user.password),
        balance = money(user.balance),
    ));

    if user.subscribed {
        html.push_str("<p>You are subscribed to the service. You can make unlimited trades.</p>\n");
    } else {
        html.push_str(&format!(
            "<p>You are not subscribed to the service. You can only make {} more trades for free.</p>\n",
            user.remaining_free_trades()
        ));
        html.push_str("<button type=\"submit\" name=\"intent\" value=\"subscribe\">Subscribe</button>\n");
    }

    html.push_str("<h2>Your Portfolio</h2>\n");
    html.push_str(&format!(
        "<p>Your portfolio value is {}</p>\n<p>Your portfolio profit/loss is {}</p>\n",
        money(portfolio.value),
        money(portfolio.profit),
    ));
    html.push_str("<p>Your portfolio breakdown:</p>\n");
    html.push_str("<table>\n<tr><th>Symbol</th><th>Quantity</th></tr>\n");
    for (symbol, quantity) in &portfolio.positions {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            escape(symbol),
            quantity
        ));
    }
    html.push_str("</table>\n");
    if !portfolio.unpriced.is_empty() {
        html.push_str(&format!(
            "<p>No current price for: {}</p>\n",
            escape(&portfolio.unpriced.join(", "))
        ));
    }

    html.push_str("<h2>Make a Trade</h2>\n");
    html.push_str(&format!(
        r#"<label>Symbol <input type="text" name="symbol" value="{symbol}"></label>
<label>Quantity <input type="number" name="quantity" min="1" max="100" step="1" value="{quantity}"></label>
<label>Action <select name="action">
<option value="buy"{buy}>Buy</option>
<option value="sell"{sell}>Sell</option>
</select></label>
"#,
        symbol = escape(&draft.symbol),
        quantity = draft.quantity,
        buy = selected(Side::Buy, draft),
        sell = selected(Side::Sell, draft),
    ));
    if user.can_trade() {
        html.push_str("<button type=\"submit\" name=\"intent\" value=\"trade\">Confirm Trade</button>\n");
    } else {
        html.push_str(&format!(
            "<p>You have reached the limit of {} trades for free users. Please subscribe to the service to make more trades.</p>\n",
            user.free_limit()
        ));
    }

    for message in messages {
        html.push_str(&format!("<p class=\"message\">{}</p>\n", escape(message)));
    }

    if !user.trades.is_empty() {
        html.push_str("<h2>Trade History</h2>\n<table>\n");
        html.push_str("<tr><th>Time</th><th>Symbol</th><th>Action</th><th>Quantity</th><th>Price</th></tr>\n");
        for trade in &user.trades {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                trade.executed_at.format("%Y-%m-%d %H:%M:%S UTC"),
                escape(&trade.symbol),
                trade.side,
                trade.quantity,
                money(trade.price)
            ));
        }
        html.push_str("</table>\n");
    }

    html.push_str("</main>\n</form>\n</body>\n</html>\n");
    html
}
