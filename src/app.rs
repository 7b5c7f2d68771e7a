use crate::event::AppEvent;
use crate::portal::PortalClient;
use crate::record::{Entry, EntryId, RecordState};
use crate::theme::Theme;
use crate::wallet::{Address, SessionStatus};
use eframe::egui::{self, Color32, RichText, ScrollArea};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{SystemTime, UNIX_EPOCH};

/// The rendered view of the record. `Unknown` and `Uninitialized` are
/// distinct: one means "fetch pending or failed", the other is the remote's
/// authoritative "record was never created".
enum RecordView {
    Unknown,
    Uninitialized,
    Ready { entries: Vec<EntryRow> },
}

struct EntryRow {
    entry: Entry,
    /// Optimistic local echo awaiting the authoritative refetch.
    provisional: bool,
}

pub struct GifPortApp {
    rx: Receiver<AppEvent>,
    portal: PortalClient,
    theme: Theme,
    session_status: SessionStatus,
    wallet_address: Option<Address>,
    record: RecordView,
    input_buffer: String,
    mutation_in_flight: bool,
    last_error: Option<String>,
    diagnostics_log: Vec<String>,
}

impl GifPortApp {
    pub fn new(rx: Receiver<AppEvent>, portal: PortalClient) -> Self {
        Self {
            rx,
            portal,
            theme: Theme::default(),
            session_status: SessionStatus::Unknown,
            wallet_address: None,
            record: RecordView::Unknown,
            input_buffer: String::new(),
            mutation_in_flight: false,
            last_error: None,
            diagnostics_log: Vec::new(),
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    fn timestamp() -> String {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs().to_string(),
            Err(_) => "0".to_string(),
        }
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics_log
            .push(format!("[{}] {}", Self::timestamp(), message.into()));
    }

    fn status_label(&self) -> (&'static str, Color32) {
        match self.session_status {
            SessionStatus::Unknown => ("Checking Wallet...", self.theme.text_muted),
            SessionStatus::Disconnected => ("Disconnected", self.theme.text_muted),
            SessionStatus::Connecting => ("Connecting...", self.theme.warning),
            SessionStatus::Connected => ("Wallet Connected", self.theme.success),
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event, Some(ctx)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent, ctx: Option<&egui::Context>) {
        match event {
            AppEvent::StatusChanged(status) => {
                if status == SessionStatus::Disconnected {
                    self.wallet_address = None;
                    self.record = RecordView::Unknown;
                    self.mutation_in_flight = false;
                }
                self.session_status = status;
                self.log_diagnostic(format!("session status: {status:?}"));
            }
            AppEvent::WalletConnected(address) => {
                self.log_diagnostic(format!("connected as {address}"));
                self.session_status = SessionStatus::Connected;
                self.wallet_address = Some(address);
            }
            AppEvent::RecordFetched(state) => {
                // Authoritative snapshot: replaces any optimistic rows.
                self.mutation_in_flight = false;
                self.last_error = None;
                self.record = match state {
                    RecordState::Absent => {
                        self.log_diagnostic("record absent; initialization required");
                        RecordView::Uninitialized
                    }
                    RecordState::Present { entries } => {
                        self.log_diagnostic(format!("record fetched: {} entries", entries.len()));
                        RecordView::Ready {
                            entries: entries
                                .into_iter()
                                .map(|entry| EntryRow {
                                    entry,
                                    provisional: false,
                                })
                                .collect(),
                        }
                    }
                };
            }
            AppEvent::RecordUnavailable(message) => {
                self.mutation_in_flight = false;
                self.discard_provisional_rows();
                self.log_diagnostic(format!("record state unknown: {message}"));
                self.last_error = Some(message);
                // Last known-good entries stay rendered; only an unknown
                // view falls back to the uninitialized display.
                if !matches!(self.record, RecordView::Ready { .. }) {
                    self.record = RecordView::Uninitialized;
                }
            }
            AppEvent::PortalError(message) => {
                self.mutation_in_flight = false;
                self.discard_provisional_rows();
                self.log_diagnostic(format!("operation failed: {message}"));
                self.last_error = Some(message);
            }
        }

        if let Some(ctx) = ctx {
            ctx.request_repaint();
        }
    }

    /// A failed operation must leave the list in its prior stable state;
    /// optimistic echoes are only ever confirmed by an authoritative fetch.
    fn discard_provisional_rows(&mut self) {
        if let RecordView::Ready { entries } = &mut self.record {
            entries.retain(|row| !row.provisional);
        }
    }

    fn submit_entry(&mut self, ctx: &egui::Context) {
        let content = self.input_buffer.trim().to_string();
        if content.is_empty() {
            return;
        }

        // Immediate optimistic echo; the follow-up authoritative refetch
        // replaces the whole list, provisional rows included.
        if let RecordView::Ready { entries } = &mut self.record {
            let author = self
                .wallet_address
                .clone()
                .unwrap_or_else(|| Address::new("unknown"));
            entries.push(EntryRow {
                entry: Entry {
                    id: EntryId::new(format!("provisional-{}", Self::timestamp())),
                    content: content.clone(),
                    author,
                    vote_count: 0,
                },
                provisional: true,
            });
        }

        self.portal.append_entry(content);
        self.input_buffer.clear();
        self.mutation_in_flight = true;
        ctx.request_repaint();
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let (status_text, status_color) = self.status_label();
        let mut disconnect_clicked = false;
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("GIF Portal");
                ui.separator();
                ui.label(RichText::new(status_text).color(status_color));
                if let Some(address) = &self.wallet_address {
                    ui.separator();
                    ui.label(
                        RichText::new(address.abbreviated())
                            .monospace()
                            .color(self.theme.text_muted),
                    );
                    disconnect_clicked = ui.button("Disconnect").clicked();
                }
            });
        });
        if disconnect_clicked {
            self.portal.disconnect();
        }
    }

    fn render_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("View your GIF collection");
            ui.separator();

            if let Some(message) = &self.last_error {
                ui.label(RichText::new(message.clone()).color(self.theme.danger));
                ui.separator();
            }

            match self.session_status {
                SessionStatus::Unknown => {
                    ui.label("Checking for a wallet session...");
                }
                SessionStatus::Connecting => {
                    ui.label("Waiting for wallet approval...");
                }
                SessionStatus::Disconnected => {
                    if self.portal.capability_present() {
                        if ui.button("Connect to Wallet").clicked() {
                            self.portal.connect();
                        }
                    } else {
                        ui.label(
                            RichText::new(
                                "No wallet capability found. Provision a wallet to continue.",
                            )
                            .color(self.theme.warning),
                        );
                    }
                }
                SessionStatus::Connected => self.render_record(ui, ctx),
            }

            ui.separator();
            egui::CollapsingHeader::new("Diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(90.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in &self.diagnostics_log {
                                ui.label(entry);
                            }
                        });
                });
        });
    }

    fn render_record(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        match &self.record {
            RecordView::Unknown => {
                ui.label("Fetching record...");
            }
            RecordView::Uninitialized => {
                ui.label("The shared record has not been created yet.");
                let clicked = ui
                    .add_enabled(
                        !self.mutation_in_flight,
                        egui::Button::new("Do One-Time Record Initialization"),
                    )
                    .clicked();
                if clicked {
                    self.mutation_in_flight = true;
                    self.portal.initialize_record();
                }
            }
            RecordView::Ready { .. } => {
                self.render_composer(ui, ctx);
                ui.separator();
                self.render_entries(ui);
            }
        }
    }

    fn render_composer(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let input_enabled = !self.mutation_in_flight;
        let hint = if self.mutation_in_flight {
            "Waiting for confirmation..."
        } else {
            "Enter gif link!"
        };

        let mut send_now = false;
        self.theme.composer_frame().show(ui, |ui| {
            ui.horizontal(|ui| {
                let response = ui.add_enabled(
                    input_enabled,
                    egui::TextEdit::singleline(&mut self.input_buffer)
                        .desired_width(f32::INFINITY)
                        .hint_text(hint),
                );
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    send_now = true;
                }

                let clicked = ui
                    .add_enabled(
                        input_enabled && !self.input_buffer.trim().is_empty(),
                        egui::Button::new("Submit"),
                    )
                    .clicked();
                send_now |= clicked;
            });
        });

        if send_now && input_enabled {
            self.submit_entry(ctx);
        }
    }

    fn render_entries(&mut self, ui: &mut egui::Ui) {
        // Rapid votes are independent requests; the most recent refetch
        // wins, so vote buttons stay enabled while mutations are in flight.
        let mut voted: Option<EntryId> = None;
        if let RecordView::Ready { entries } = &self.record {
            if entries.is_empty() {
                ui.label(RichText::new("No GIFs yet. Submit the first one!").color(self.theme.text_muted));
            }
            ScrollArea::vertical()
                .id_salt("entry_list")
                .stick_to_bottom(false)
                .show(ui, |ui| {
                    for row in entries {
                        self.theme.card_frame().show(ui, |ui| {
                            ui.hyperlink_to(row.entry.content.clone(), row.entry.content.clone());
                            ui.horizontal(|ui| {
                                ui.label(
                                    RichText::new(format!(
                                        "by {}",
                                        row.entry.author.abbreviated()
                                    ))
                                    .color(self.theme.text_muted),
                                );
                                ui.separator();
                                ui.label(format!("{} votes", row.entry.vote_count));
                                if row.provisional {
                                    ui.label(
                                        RichText::new("confirming...")
                                            .color(self.theme.warning),
                                    );
                                } else if ui.button("Upvote").clicked() {
                                    voted = Some(row.entry.id.clone());
                                }
                            });
                        });
                    }
                });
        }
        if let Some(id) = voted {
            self.portal.vote_entry(id);
        }
    }
}

impl eframe::App for GifPortApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        self.render_top_bar(ctx);
        self.render_central_panel(ctx);
    }
}
