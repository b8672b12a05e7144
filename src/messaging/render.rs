//! Plain text rendering of everything the bot posts. Wording is French to
//! match the club's server.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;

use crate::events::VoteOutcome;
use crate::events::models::{
    AttendanceStatus, Attendee, AttendanceSummary, EventParams, Recurrence,
};

const NOBODY_YET: &str = "— Personne pour l'instant —";
const NOBODY: &str = "Personne";

pub fn weekday_fr(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "lundi",
        Weekday::Tue => "mardi",
        Weekday::Wed => "mercredi",
        Weekday::Thu => "jeudi",
        Weekday::Fri => "vendredi",
        Weekday::Sat => "samedi",
        Weekday::Sun => "dimanche",
    }
}

fn time_label(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn duration_label(hours: f64) -> String {
    let minutes = (hours * 60.0).round() as i64;
    match (minutes / 60, minutes % 60) {
        (h, 0) => format!("{}h", h),
        (0, m) => format!("{} min", m),
        (h, m) => format!("{}h{:02}", h, m),
    }
}

fn recurrence_label(recurrence: Recurrence) -> &'static str {
    match recurrence {
        Recurrence::None => "",
        Recurrence::Weekly => " (Récurrent : Hebdomadaire)",
        Recurrence::Monthly => " (Récurrent : Mensuel)",
    }
}

fn names(attendees: &[Attendee], empty: &str) -> String {
    if attendees.is_empty() {
        return empty.to_string();
    }
    attendees
        .iter()
        .map(|a| format!("• {}", a.display_name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn roster(summary: &AttendanceSummary, empty: &str) -> String {
    format!(
        "✅ **Présent·e·s ({})**\n{}\n\n❓ **Indécis·e·s ({})**\n{}\n\n❌ **Absent·e·s ({})**\n{}",
        summary.coming.len(),
        names(&summary.coming, empty),
        summary.maybe.len(),
        names(&summary.maybe, empty),
        summary.not_coming.len(),
        names(&summary.not_coming, empty),
    )
}

fn header(params: &EventParams, tz: Tz) -> String {
    let mut out = format!(
        "📅 **Entraînement : {} {}**\n**Heure** : {} ({})\n**Durée** : {}",
        weekday_fr(params.start_date.weekday()),
        params.start_date,
        time_label(params.start_time),
        tz,
        duration_label(params.duration_hours),
    );
    if !params.details.is_empty() {
        out.push_str(&format!("\n**Lieu/Détails** : {}", params.details));
    }
    out
}

/// The announcement with the live roster under it.
pub fn announcement(params: &EventParams, summary: &AttendanceSummary, tz: Tz) -> String {
    format!(
        "{}\n\n**Veuillez répondre{}** : cliquez sur un bouton ci-dessous.\n\n{}",
        header(params, tz),
        recurrence_label(params.recurrence),
        roster(summary, NOBODY_YET),
    )
}

pub fn cancelled_announcement(params: &EventParams, summary: &AttendanceSummary, tz: Tz) -> String {
    format!(
        "🚫 **ANNULÉ**\n{}\n\n{}",
        header(params, tz),
        roster(summary, NOBODY)
    )
}

pub fn thread_name(date: NaiveDate) -> String {
    format!("💬 Discussion entraînement du {}", date)
}

pub fn thread_welcome(date: NaiveDate) -> String {
    format!(
        "Utilisez ce fil pour discuter des détails de l'entraînement du {}.",
        date
    )
}

pub fn new_event_ping(mentions: &str, date: NaiveDate, time: NaiveTime, tz: Tz) -> String {
    format!(
        "Nouvel entraînement publié ! {} veuillez répondre. ({} @ {}, {})",
        mentions,
        date,
        time_label(time),
        tz
    )
}

pub fn three_day_reminder(mentions: &str, date: NaiveDate, time: NaiveTime) -> String {
    format!(
        "📣 {} Rappel : entraînement {} {} à {}, dans 3 jours ! Pensez à indiquer votre présence.",
        mentions,
        weekday_fr(date.weekday()),
        date,
        time_label(time),
    )
}

pub fn user_mentions<'a>(attendees: impl Iterator<Item = &'a Attendee>) -> String {
    attendees
        .map(|a| format!("<@{}>", a.user_id))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn one_day_reminder(mentions: &str, time: NaiveTime) -> String {
    if mentions.is_empty() {
        format!(
            "🔔 Rappel : l'entraînement a lieu demain à {} !",
            time_label(time)
        )
    } else {
        format!(
            "🔔 Rappel : l'entraînement a lieu demain à {} ! Participant·e·s et indécis·e·s : {}",
            time_label(time),
            mentions
        )
    }
}

pub fn two_hour_dm(date: NaiveDate, time: NaiveTime, details: &str) -> String {
    let mut out = format!(
        "⏰ L'entraînement du {} commence dans environ 2 heures ({}).",
        date,
        time_label(time)
    );
    if !details.is_empty() {
        out.push_str(&format!("\n**Lieu/Détails** : {}", details));
    }
    out
}

pub fn final_report(date: NaiveDate, summary: &AttendanceSummary) -> String {
    format!(
        "✅ **Rapport final {}**\nÉvénement terminé.\n\n{}",
        date,
        roster(summary, NOBODY)
    )
}

pub fn thread_closing(keep_thread: bool) -> &'static str {
    if keep_thread {
        "Événement terminé. Fil archivé."
    } else {
        "Événement terminé. Fil supprimé."
    }
}

pub const UNKNOWN_BUTTON: &str = "Ce bouton n'est plus valide.";

/// Private answer to the member who clicked an RSVP button.
pub fn vote_reply(outcome: VoteOutcome, status: AttendanceStatus) -> &'static str {
    match (outcome, status) {
        (VoteOutcome::Recorded, AttendanceStatus::Coming) => {
            "Vous êtes marqué·e comme 'Présent·e'. Rendez-vous là-bas !"
        }
        (VoteOutcome::Recorded, AttendanceStatus::Maybe) => {
            "Vous êtes marqué·e comme 'Indécis·e'. Merci de mettre à jour si possible !"
        }
        (VoteOutcome::Recorded, AttendanceStatus::NotComing) => {
            "Vous êtes marqué·e comme 'Absent·e'. Merci d'avoir prévenu."
        }
        (VoteOutcome::EventCancelled, _) => "Désolé, cet événement a été annulé.",
        (VoteOutcome::EventEnded | VoteOutcome::NotFound, _) => {
            "Désolé, cet événement est déjà terminé."
        }
    }
}

pub fn cancellation_notice(date: NaiveDate) -> String {
    format!("🚫 L'entraînement du {} est annulé.", date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> AttendanceSummary {
        AttendanceSummary {
            coming: vec![Attendee {
                user_id: 7,
                display_name: "Sam".to_string(),
            }],
            maybe: vec![Attendee {
                user_id: 8,
                display_name: "Alex".to_string(),
            }],
            not_coming: vec![],
        }
    }

    #[test]
    fn it_renders_the_roster_with_counts() {
        let out = roster(&summary(), NOBODY_YET);
        assert!(out.contains("Présent·e·s (1)**\n• Sam"));
        assert!(out.contains("Indécis·e·s (1)**\n• Alex"));
        assert!(out.contains("Absent·e·s (0)**\n— Personne pour l'instant —"));
    }

    #[test]
    fn it_localizes_the_weekday() {
        let mut params = EventParams::parse(1, "2025-03-10", "19:00", "Gymnase").unwrap();
        params.recurrence = Recurrence::Weekly;
        let out = announcement(&params, &AttendanceSummary::default(), chrono_tz::Europe::Paris);
        assert!(out.contains("lundi 2025-03-10"));
        assert!(out.contains("19:00 (Europe/Paris)"));
        assert!(out.contains("Hebdomadaire"));
    }

    #[test]
    fn it_mentions_interested_users() {
        let s = summary();
        assert_eq!(user_mentions(s.interested()), "<@7> <@8>");
    }

    #[test]
    fn it_formats_durations() {
        assert_eq!(duration_label(2.0), "2h");
        assert_eq!(duration_label(1.5), "1h30");
        assert_eq!(duration_label(0.75), "45 min");
    }

    #[test]
    fn closing_text_follows_the_thread_fate() {
        assert!(thread_closing(true).contains("archivé"));
        assert!(thread_closing(false).contains("supprimé"));
    }
}
