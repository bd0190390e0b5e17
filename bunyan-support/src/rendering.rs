//! Text rendering helpers for bean names and error messages.
//!
//! Used by the container to derive default bean names, to print creation
//! chains when a cycle is found and to offer "did you mean?" hints when a
//! lookup misses.

/// Renders a creation chain on one line.
///
/// # Examples
/// ```
/// use bunyan_support::rendering::render_chain;
///
/// let chain = vec!["orderService", "paymentGateway", "orderService"];
/// assert_eq!(render_chain(&chain), "orderService → paymentGateway → orderService");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// One step of a creation chain, rendered by [`render_chain_vertical`].
#[derive(Debug, Clone)]
pub struct ChainEntry {
    /// Bean name
    pub label: String,
    /// Declared type of the bean
    pub type_name: String,
    /// How the bean is built, e.g. `AppConfig.dataSource(String)`
    pub origin: Option<String>,
}

/// Renders a creation chain one bean per line.
///
/// ```text
/// [orderService  ] OrderService
///                  ↓
/// [paymentGateway] PaymentGateway  (via AppConfig.paymentGateway(OrderService))
/// ```
pub fn render_chain_vertical(entries: &[ChainEntry]) -> String {
    let width = entries.iter().map(|e| e.label.len()).max().unwrap_or(0);
    let mut out = String::new();

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(&" ".repeat(width + 3));
            out.push_str("↓\n");
        }

        out.push_str(&format!(
            "[{:<width$}] {}",
            entry.label,
            entry.type_name,
            width = width,
        ));

        if let Some(ref origin) = entry.origin {
            out.push_str(&format!("  (via {origin})"));
        }

        out.push('\n');
    }

    out
}

/// Strips module paths from a type name, keeping generics readable.
///
/// ```
/// use bunyan_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("shop::orders::OrderService"), "OrderService");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn shop::ports::Clock>"),
///     "Arc<dyn Clock>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Lowercases the first character: `OrderService` becomes `orderService`.
///
/// ```
/// use bunyan_support::rendering::decapitalize;
///
/// assert_eq!(decapitalize("OrderService"), "orderService");
/// assert_eq!(decapitalize(""), "");
/// ```
pub fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Ranks `available` names by similarity to `requested` for "did you mean?"
/// hints. Returns at most `max_suggestions` names, best first.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter_map(|&name| {
            let name_lower = name.to_lowercase();
            let name_short = shorten_type_name(name).to_lowercase();

            if name_lower == requested_lower {
                return None;
            }

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 100));
            }

            if name_short.contains(&requested_short) || requested_short.contains(&name_short) {
                return Some((name, 80));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            (common >= 3).then_some((name, common * 10))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}
