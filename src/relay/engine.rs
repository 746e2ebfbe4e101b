//! Relay engine - routes inbound texts to transaction handlers.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{error, info, warn};

use crate::relay::amounts::{self, CashoutRejection};
use crate::relay::cashin::{self, VerifyError};
use crate::relay::database::{Cashout, Database, GameRecharge, SupportTicket};
use crate::relay::intent::{self, Game, Intent};
use crate::relay::services::{
    Alerter, DepositLookup, Notifier, PointsLookup, ProfileLookup, ReceiverParser, ReplyGenerator,
};

static SPLIT_KEYWORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)split").expect("static regex"));

/// Outbound collaborators used by the engine.
#[derive(Clone)]
pub struct Services {
    pub notifier: Arc<dyn Notifier>,
    pub alerter: Arc<dyn Alerter>,
    pub replies: Arc<dyn ReplyGenerator>,
    pub points: Arc<dyn PointsLookup>,
    pub deposits: Arc<dyn DepositLookup>,
    pub receivers: Arc<dyn ReceiverParser>,
    pub profiles: Arc<dyn ProfileLookup>,
}

/// The relay engine.
pub struct RelayEngine {
    database: Arc<Database>,
    services: Services,
    /// Cash App account payments must be addressed to.
    payment_receiver: String,
}

impl RelayEngine {
    pub fn new(database: Arc<Database>, services: Services, payment_receiver: String) -> Self {
        Self {
            database,
            services,
            payment_receiver,
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Handle one inbound text message from `sender_id`.
    pub async fn handle_text(&self, sender_id: &str, text: &str) -> Intent {
        let intent = intent::classify(text);
        let preview: String = text.chars().take(100).collect();
        info!("📨 {sender_id}: \"{preview}\" → {intent:?}");

        match intent {
            Intent::Greeting => self.greet(sender_id, text).await,
            Intent::AskUsername => self.ask_username(sender_id).await,
            Intent::CashIn => self.cash_in(sender_id, text).await,
            Intent::Confirm => self.confirm(sender_id).await,
            Intent::SplitRecharge => self.split_recharge(sender_id, text).await,
            Intent::SingleRecharge => self.single_recharge(sender_id, text).await,
            Intent::Cashout => self.cashout(sender_id, text).await,
            Intent::Support => self.support(sender_id, text).await,
            Intent::Fallback => self.fallback(sender_id, text).await,
        }

        intent
    }

    async fn greet(&self, sender_id: &str, text: &str) {
        let name = match self.services.profiles.first_name(sender_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Profile lookup failed for {sender_id}: {e}");
                "there".to_string()
            }
        };
        let reply = self
            .services
            .replies
            .reply(text, &format!("greeting a player named {name}"))
            .await;
        self.notify(sender_id, &format!("Hi {name}! {reply}")).await;
    }

    async fn ask_username(&self, sender_id: &str) {
        self.notify(
            sender_id,
            "Which game do you play? Send the game and your username, e.g. \"GameA yourname\".",
        )
        .await;
    }

    async fn cash_in(&self, sender_id: &str, text: &str) {
        let Some(url) = cashin::extract_link(text) else {
            self.notify(sender_id, "Please send your full Cash App payment link.").await;
            return;
        };

        let result = cashin::verify_and_record(
            &self.database,
            self.services.receivers.as_ref(),
            &self.payment_receiver,
            sender_id,
            url,
        );

        match result {
            Ok(amount) => {
                let recharge = amounts::recharge_amount(amount);
                info!("💵 Verified cash-in ${amount:.2} from {sender_id}");
                self.notify(
                    sender_id,
                    &format!(
                        "Payment of ${amount:.2} verified ✅ With your 10% bonus that's ${recharge:.2}. Reply \"yes\" to load it."
                    ),
                )
                .await;
                self.alert(&format!("💵 Cash-in ${amount:.2} from {sender_id}\n{url}")).await;
            }
            Err(VerifyError::Store(e)) => {
                error!("Failed to record receipt for {sender_id}: {e}");
                self.notify(sender_id, "Something went wrong on our side. Please try again shortly.").await;
            }
            Err(e) => {
                info!("Rejected cash-in from {sender_id}: {e}");
                self.notify(
                    sender_id,
                    "We couldn't verify that payment. Please check the link and send it again.",
                )
                .await;
            }
        }
    }

    async fn confirm(&self, sender_id: &str) {
        let Some(base) = self.last_amount(sender_id).await else {
            return;
        };
        let recharge = amounts::recharge_amount(base);
        self.notify(
            sender_id,
            &format!("Confirmed! Loading ${recharge:.2}. Tell us which game: GameA or GameB."),
        )
        .await;
        self.alert(&format!("✅ {sender_id} confirmed a ${recharge:.2} recharge")).await;
    }

    async fn single_recharge(&self, sender_id: &str, text: &str) {
        let Some(game) = Game::find(text) else {
            return;
        };
        let Some(base) = self.last_amount(sender_id).await else {
            return;
        };
        let username = game.username_in(text).unwrap_or_default();
        let amount = amounts::recharge_amount(base);

        let record = GameRecharge::new(sender_id, game.as_str(), &username, amount, &self.payment_receiver);
        if let Err(e) = self.database.insert_recharge(&record) {
            error!("Failed to record recharge for {sender_id}: {e}");
            self.notify(sender_id, "Something went wrong on our side. Please try again shortly.").await;
            return;
        }

        info!("🎮 Recharge {game} ${amount:.2} for {sender_id}");
        self.notify(
            sender_id,
            &format!("Loading ${amount:.2} onto {game} for {}. Good luck! 🍀", display_username(&username)),
        )
        .await;
        self.alert(&format!(
            "🎮 Recharge {game} ${amount:.2}\nuser: {} ({sender_id})",
            display_username(&username)
        ))
        .await;
    }

    async fn split_recharge(&self, sender_id: &str, text: &str) {
        let Some(total) = self.last_amount(sender_id).await else {
            return;
        };

        let segments = SPLIT_KEYWORD.replace(text, "");
        let allocations = amounts::allocate_split(&segments, total);

        if allocations.is_empty() {
            self.notify(
                sender_id,
                "Tell us how to split, e.g. \"split GameA $5, GameB\".",
            )
            .await;
            return;
        }

        let mut lines = Vec::new();
        for allocation in &allocations {
            let record = GameRecharge::new(
                sender_id,
                allocation.game.as_str(),
                &allocation.username,
                allocation.amount,
                &self.payment_receiver,
            );
            if let Err(e) = self.database.insert_recharge(&record) {
                error!("Failed to record split recharge for {sender_id}: {e}");
                continue;
            }
            lines.push(format!("{}: ${:.2}", allocation.game, allocation.amount));
        }

        if lines.is_empty() {
            self.notify(sender_id, "Something went wrong on our side. Please try again shortly.").await;
            return;
        }

        let summary = lines.join("\n");
        info!("🎮 Split recharge for {sender_id}: {}", lines.join(", "));
        self.notify(sender_id, &format!("Split recharge loaded:\n{summary}")).await;
        self.alert(&format!("🎮 Split recharge for {sender_id}\n{summary}")).await;
    }

    async fn cashout(&self, sender_id: &str, text: &str) {
        let game = Game::find(text).map(Game::as_str).unwrap_or("unspecified");
        let username = word_after(text, "cashout").unwrap_or_default();

        let Some(base) = self.last_amount(sender_id).await else {
            return;
        };
        let deposit = amounts::recharge_amount(base);

        let points = match self.services.points.points(sender_id, &username).await {
            Ok(points) => points,
            Err(e) => {
                warn!("Points lookup failed for {sender_id}: {e}");
                self.notify(sender_id, "We couldn't check your points right now. Please try again shortly.")
                    .await;
                return;
            }
        };

        let quote = match amounts::quote_cashout(deposit, points) {
            Ok(quote) => quote,
            Err(rejection) => {
                info!("Rejected cashout for {sender_id}: {rejection}");
                let reason = match rejection {
                    CashoutRejection::TooFewPoints { min_points, .. } => {
                        format!("You need at least {min_points:.2} points to cash out.")
                    }
                    CashoutRejection::TooManyPoints { max_points, .. } => {
                        format!("Cashouts are capped at {max_points:.2} points for your deposit. Contact support.")
                    }
                };
                self.notify(sender_id, &format!("Can't cash out {points:.2} points yet. {reason}")).await;
                return;
            }
        };

        let record = Cashout::new(sender_id, game, &username, quote.amount, quote.points_remaining);
        if let Err(e) = self.database.insert_cashout(&record) {
            error!("Failed to record cashout for {sender_id}: {e}");
            self.notify(sender_id, "Something went wrong on our side. Please try again shortly.").await;
            return;
        }

        let mut message = format!(
            "Cashout of ${:.2} is on its way 💸 Points remaining: {:.2}.",
            quote.amount, quote.points_remaining
        );
        if let Some((low, high)) = quote.next_range {
            message.push_str(&format!(" Next cashout eligible between {low:.2} and {high:.2}."));
        }
        info!("💸 Cashout ${:.2} for {sender_id}", quote.amount);
        self.notify(sender_id, &message).await;
        self.alert(&format!(
            "💸 Cashout ${:.2} ({game})\nuser: {} ({sender_id})\npoints: {:.2}, remaining: {:.2}",
            quote.amount,
            display_username(&username),
            quote.points,
            quote.points_remaining
        ))
        .await;
    }

    async fn support(&self, sender_id: &str, text: &str) {
        let summary = text.trim();

        if let Err(e) = self.database.insert_support_ticket(&SupportTicket::new(sender_id, summary)) {
            error!("Failed to record support ticket for {sender_id}: {e}");
        }

        self.alert(&format!("🆘 Support request from {sender_id}:\n{summary}")).await;
        self.notify(sender_id, "Thanks, our support team has been notified and will reach out soon.").await;
    }

    async fn fallback(&self, sender_id: &str, text: &str) {
        let reply = self
            .services
            .replies
            .reply(text, "the player's message didn't match any menu option")
            .await;
        self.notify(sender_id, &reply).await;
    }

    async fn last_amount(&self, sender_id: &str) -> Option<f64> {
        match self.services.deposits.last_amount(sender_id).await {
            Ok(amount) => Some(amount),
            Err(e) => {
                warn!("Deposit lookup failed for {sender_id}: {e}");
                self.notify(sender_id, "We couldn't find your last payment. Please send the Cash App link again.")
                    .await;
                None
            }
        }
    }

    async fn notify(&self, sender_id: &str, text: &str) {
        if let Err(e) = self.services.notifier.send_text(sender_id, text).await {
            warn!("Failed to send message to {sender_id}: {e}");
        }
    }

    async fn alert(&self, text: &str) {
        if let Err(e) = self.services.alerter.alert(text).await {
            warn!("Failed to send alert: {e}");
        }
    }
}

fn display_username(username: &str) -> &str {
    if username.is_empty() { "(no username)" } else { username }
}

/// The word following `keyword`, case-insensitive.
fn word_after(text: &str, keyword: &str) -> Option<String> {
    let mut words = text.split_whitespace();
    words.find(|w| w.to_lowercase().contains(keyword))?;
    words
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
}
