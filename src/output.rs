pub struct Styler {
    color_enabled: bool,
}

impl Styler {
    pub fn new(color_enabled: bool) -> Self {
        Self { color_enabled }
    }

    fn paint(&self, code: &str, s: &str) -> String {
        if self.color_enabled {
            format!("\u{001b}[{}m{}\u{001b}[0m", code, s)
        } else {
            s.to_string()
        }
    }

    pub fn green(&self, s: &str) -> String {
        self.paint("32", s)
    }

    pub fn red(&self, s: &str) -> String {
        self.paint("31", s)
    }

    pub fn yellow(&self, s: &str) -> String {
        self.paint("33", s)
    }

    pub fn dim(&self, s: &str) -> String {
        self.paint("90", s)
    }

    /// Green for credits, red for debits.
    pub fn points(&self, delta: i64) -> String {
        let s = format_points(delta);
        if delta < 0 {
            self.red(&s)
        } else {
            self.green(&s)
        }
    }
}

/// Terminal columns a string occupies; CJK, fullwidth forms, emoji and block
/// elements count as two. ANSI escape sequences count as zero.
pub fn display_width(s: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    for c in s.chars() {
        if in_escape {
            in_escape = c != 'm';
            continue;
        }
        if c == '\u{001b}' {
            in_escape = true;
            continue;
        }
        width += if is_wide(c) { 2 } else { 1 };
    }
    width
}

fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2580..=0x259F
        | 0x2600..=0x27BF
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xAC00..=0xD7AF
        | 0xF900..=0xFAFF
        | 0xFF00..=0xFF60
        | 0x1F300..=0x1F6FF
        | 0x1F900..=0x1F9FF
        | 0x20000..=0x2FFFD)
}

fn pad(s: &str, width: usize, right_align: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(display_width(s)));
    if right_align {
        fill + s
    } else {
        format!("{}{}", s, fill)
    }
}

/// Column-aligned table. Numeric columns are right-aligned.
pub struct Table {
    headers: Vec<String>,
    numeric: Vec<bool>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            numeric: vec![false; headers.len()],
            rows: Vec::new(),
        }
    }

    pub fn numeric(mut self, columns: &[usize]) -> Self {
        for &i in columns {
            if let Some(flag) = self.numeric.get_mut(i) {
                *flag = true;
            }
        }
        self
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| display_width(h)).collect();
        for row in self.rows.iter() {
            for (i, cell) in row.iter().enumerate() {
                let w = display_width(cell);
                match widths.get_mut(i) {
                    Some(existing) => *existing = (*existing).max(w),
                    None => widths.push(w),
                }
            }
        }

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .enumerate()
                .map(|(i, c)| pad(c, widths[i], self.numeric.get(i).copied().unwrap_or(false)))
                .collect::<Vec<String>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = vec![line(&self.headers)];
        out.extend(self.rows.iter().map(|r| line(r)));
        out.join("\n")
    }
}

pub fn format_points(delta: i64) -> String {
    if delta > 0 {
        format!("+{}", delta)
    } else {
        delta.to_string()
    }
}

pub fn format_minutes(minutes: u64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {:02}m", h, m),
    }
}

pub fn progress_bar(percent: Option<u32>, width: usize) -> String {
    match percent {
        None => "█".repeat(width),
        Some(p) => {
            let filled = ((p.min(100) as f64 / 100.0) * width as f64).round() as usize;
            format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
        }
    }
}
