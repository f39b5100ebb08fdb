// 🖥️ Results Viewer - browse the enriched analysis table in the terminal
//
// Units page:   one row per unique unit, filter by category, cycle sort column
// Summary page: unreconciled category counts per party

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use party_accounts::{
    aggregate, combined_name, AggregateReport, AnalysisRecord, Category, CategoryClassifier, PartyAliases,
    WarningSink,
};
use party_accounts::report::table::{format_income, format_rate};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::collections::HashSet;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Units,
    Summary,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Units => Page::Summary,
            Page::Summary => Page::Units,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Income,
    TaxRate,
    Party,
    Unit,
}

impl SortColumn {
    pub fn next(&self) -> Self {
        match self {
            SortColumn::Income => SortColumn::TaxRate,
            SortColumn::TaxRate => SortColumn::Party,
            SortColumn::Party => SortColumn::Unit,
            SortColumn::Unit => SortColumn::Income,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            SortColumn::Income => "income ↓",
            SortColumn::TaxRate => "tax rate ↑",
            SortColumn::Party => "party",
            SortColumn::Unit => "unit",
        }
    }
}

/// One unique unit with its derived category and canonical party
#[derive(Debug, Clone)]
pub struct UnitRow {
    pub record: AnalysisRecord,
    pub party: String,
    pub category: Category,
}

pub struct App {
    pub units: Vec<UnitRow>,
    pub visible: Vec<usize>,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub category_filter: Option<Category>,
    pub sort: SortColumn,
    pub summary: AggregateReport,
}

impl App {
    pub fn new(
        records: Vec<AnalysisRecord>,
        classifier: &CategoryClassifier,
        aliases: &PartyAliases,
        sink: &dyn WarningSink,
    ) -> Self {
        let summary = aggregate(&records, classifier, aliases, sink);

        let mut seen = HashSet::new();
        let units: Vec<UnitRow> = records
            .into_iter()
            .filter(|r| match combined_name(&r.unit_name, &r.entity_name) {
                Some(name) => seen.insert(name),
                None => false,
            })
            .map(|record| UnitRow {
                party: aliases.canonicalize(&record.entity_name),
                category: classifier.classify(record.rental_income, record.approx_tax_rate),
                record,
            })
            .collect();

        let mut app = Self {
            units,
            visible: Vec::new(),
            state: TableState::default(),
            current_page: Page::Units,
            show_detail: false,
            category_filter: None,
            sort: SortColumn::Income,
            summary,
        };
        app.refresh();
        app
    }

    /// Recompute the visible rows after a filter or sort change
    fn refresh(&mut self) {
        let mut visible: Vec<usize> = (0..self.units.len())
            .filter(|&i| self.category_filter.map_or(true, |c| self.units[i].category == c))
            .collect();

        let units = &self.units;
        match self.sort {
            SortColumn::Income => visible.sort_by(|&a, &b| {
                let income = |i: usize| units[i].record.rental_income.unwrap_or(f64::NEG_INFINITY);
                income(b).total_cmp(&income(a))
            }),
            SortColumn::TaxRate => visible.sort_by(|&a, &b| {
                let rate = |i: usize| units[i].record.approx_tax_rate.unwrap_or(f64::INFINITY);
                rate(a).total_cmp(&rate(b))
            }),
            SortColumn::Party => visible.sort_by(|&a, &b| units[a].party.cmp(&units[b].party)),
            SortColumn::Unit => visible.sort_by(|&a, &b| units[a].record.unit_name.cmp(&units[b].record.unit_name)),
        }

        self.visible = visible;
        self.state.select(if self.visible.is_empty() { None } else { Some(0) });
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_unit(&self) -> Option<&UnitRow> {
        self.state
            .selected()
            .and_then(|i| self.visible.get(i))
            .and_then(|&i| self.units.get(i))
    }

    pub fn set_filter(&mut self, filter: Option<Category>) {
        self.category_filter = filter;
        self.refresh();
    }

    pub fn cycle_sort(&mut self) {
        self.sort = self.sort.next();
        self.refresh();
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn next(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 20).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.visible.is_empty() {
            return;
        }
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(20));
        self.state.select(Some(i));
    }

    pub fn last(&mut self) {
        if !self.visible.is_empty() {
            self.state.select(Some(self.visible.len() - 1));
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => app.next_page(),
                KeyCode::Char('s') => app.cycle_sort(),
                KeyCode::Char('0') | KeyCode::Char('c') => app.set_filter(None),
                KeyCode::Char('1') => app.set_filter(Some(Category::NoRentalIncome)),
                KeyCode::Char('2') => app.set_filter(Some(Category::TaxPaid)),
                KeyCode::Char('3') => app.set_filter(Some(Category::LowTaxPaid)),
                KeyCode::Char('4') => app.set_filter(Some(Category::NoTaxPaid)),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.state.select(if app.visible.is_empty() { None } else { Some(0) }),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Units if app.show_detail => {
            let content = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);
            render_units(f, content[0], app);
            render_detail_panel(f, content[1], app);
        }
        Page::Units => render_units(f, chunks[1], app),
        Page::Summary => render_summary(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn category_colour(category: Category) -> Color {
    match category {
        Category::NoRentalIncome => Color::Blue,
        Category::TaxPaid => Color::Green,
        Category::LowTaxPaid => Color::Yellow,
        Category::NoTaxPaid => Color::Red,
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];
    for (i, (page, name)) in [(Page::Units, "Units"), (Page::Summary, "Summary")].iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(*name, style));
    }

    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Units: {}", app.units.len()),
        Style::default().fg(Color::White),
    ));
    for category in Category::ALL {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{}: {}", category.label(), app.summary.overall.get(category)),
            Style::default().fg(category_colour(category)),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));
    f.render_widget(header, area);
}

fn render_units(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Party", "Unit", "Income", "Tax", "Category", "MP"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells).style(Style::default().bg(Color::DarkGray)).height(1);

    let rows = app.visible.iter().map(|&i| {
        let unit = &app.units[i];
        let colour = category_colour(unit.category);
        Row::new(vec![
            Cell::from(truncate(&unit.party, 22)),
            Cell::from(truncate(&unit.record.unit_name, 30)),
            Cell::from(unit.record.rental_income.map(format_income).unwrap_or_default()),
            Cell::from(unit.record.approx_tax_rate.map(format_rate).unwrap_or_default()),
            Cell::from(unit.category.label()).style(Style::default().fg(colour)),
            Cell::from(truncate(&unit.record.mp_name, 24)),
        ])
        .height(1)
    });

    let title = match app.category_filter {
        Some(category) => format!(" Units ({}) ", category.label()),
        None => " Units ".to_string(),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(24),
            Constraint::Length(32),
            Constraint::Length(12),
            Constraint::Length(6),
            Constraint::Length(17),
            Constraint::Length(26),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_summary(f: &mut Frame, area: Rect, app: &App) {
    let mut headers = vec!["Party"];
    headers.extend(Category::ALL.iter().map(|c| c.label()));
    headers.push("Total");

    let header = Row::new(headers.into_iter().map(|h| {
        Cell::from(h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray));

    let row_for = |name: &str, counts: &party_accounts::CategoryCounts| {
        let mut cells = vec![Cell::from(truncate(name, 30))];
        for category in Category::ALL {
            cells.push(
                Cell::from(counts.get(category).to_string()).style(Style::default().fg(category_colour(category))),
            );
        }
        cells.push(Cell::from(counts.total().to_string()));
        Row::new(cells)
    };

    let mut rows = vec![row_for("Overall", &app.summary.overall)];
    rows.extend(app.summary.per_party.iter().map(|(party, counts)| row_for(party.as_str(), counts)));

    let table = Table::new(
        rows,
        [
            Constraint::Length(32),
            Constraint::Length(18),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(13),
            Constraint::Length(7),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Analyzed units by party (before reconciliation) "),
    );

    f.render_widget(table, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, app.visible.len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | Sort: "),
        Span::styled(app.sort.title().to_string(), Style::default().fg(Color::Green)),
        Span::raw(" | "),
        key("1-4"),
        Span::raw(" Filter "),
        key("0"),
        Span::raw(" All | "),
        key("s"),
        Span::raw(" Sort | "),
        key("Enter"),
        Span::raw(" Details | "),
        key("Tab"),
        Span::raw(" Page | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)));
    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Unit Details ");

    let Some(unit) = app.selected_unit() else {
        f.render_widget(Paragraph::new("No unit selected").block(block), area);
        return;
    };

    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    let record = &unit.record;

    let content = vec![
        Line::from(""),
        Line::from(vec![label("  Unit: "), Span::raw(record.unit_name.clone())]),
        Line::from(vec![label("  Party: "), Span::raw(record.entity_name.clone())]),
        Line::from(vec![label("  Grouped as: "), Span::raw(unit.party.clone())]),
        Line::from(""),
        Line::from(vec![
            label("  Rental income: "),
            Span::raw(record.rental_income.map(format_income).unwrap_or_else(|| "—".to_string())),
        ]),
        Line::from(vec![
            label("  Tax rate: "),
            Span::raw(record.approx_tax_rate.map(format_rate).unwrap_or_else(|| "—".to_string())),
        ]),
        Line::from(vec![
            label("  Category: "),
            Span::styled(unit.category.label(), Style::default().fg(category_colour(unit.category))),
        ]),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(vec![
            label("  Rented to MP: "),
            Span::raw(if record.rented_to_mp { "Yes" } else { "No" }),
        ]),
        Line::from(vec![
            label("  Years: "),
            Span::raw(record.years_rented_to_mp.map(|y| y.to_string()).unwrap_or_default()),
        ]),
        Line::from(vec![label("  MP: "), Span::raw(record.mp_name.clone())]),
        Line::from(vec![label("  Email: "), Span::raw(record.mp_email.clone())]),
        Line::from(vec![label("  Accounts #: "), Span::raw(record.number.clone())]),
        Line::from(""),
        Line::from(Span::styled(
            "  Press Enter to close",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use party_accounts::{CollectingSink, PipelineConfig, CHART_TAX_RATE_THRESHOLD};

    fn create_test_app() -> App {
        let records = vec![
            AnalysisRecord::new("Leeds", "Labour Party").with_income(5000.0).with_tax_rate(0.2),
            AnalysisRecord::new("York", "Co-operative Party").with_income(9000.0),
            AnalysisRecord::new("Bath", "Green Party"),
            AnalysisRecord::new("Leeds", "Labour Party").with_income(1.0),
        ];
        let classifier = CategoryClassifier::from_config(&PipelineConfig::new(CHART_TAX_RATE_THRESHOLD));
        App::new(records, &classifier, &PartyAliases::uk_defaults(), &CollectingSink::new())
    }

    #[test]
    fn test_app_keeps_first_occurrence_and_sorts_by_income() {
        let app = create_test_app();

        assert_eq!(app.units.len(), 3);
        let order: Vec<&str> = app.visible.iter().map(|&i| app.units[i].record.unit_name.as_str()).collect();
        assert_eq!(order, vec!["York", "Leeds", "Bath"]);
        assert_eq!(app.selected_unit().map(|u| u.party.as_str()), Some("Labour Party"));
    }

    #[test]
    fn test_category_filter_and_sort_cycle() {
        let mut app = create_test_app();

        app.set_filter(Some(Category::NoTaxPaid));
        assert_eq!(app.visible.len(), 1);
        assert_eq!(app.selected_unit().map(|u| u.record.unit_name.as_str()), Some("York"));

        app.set_filter(Some(Category::LowTaxPaid));
        assert!(app.visible.is_empty());
        assert!(app.selected_unit().is_none());

        app.set_filter(None);
        app.cycle_sort();
        assert_eq!(app.sort, SortColumn::TaxRate);
        assert_eq!(app.selected_unit().map(|u| u.record.unit_name.as_str()), Some("Leeds"));
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = create_test_app();

        app.previous();
        assert_eq!(app.state.selected(), Some(2));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.page_down();
        assert_eq!(app.state.selected(), Some(2));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("£12,345", 10), "£12,345");
        assert_eq!(truncate("Plaid Cymru - The Party of Wales", 10), "Plaid C...");
    }
}
