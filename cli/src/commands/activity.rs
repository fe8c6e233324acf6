use anyhow::{Context, Result, bail};
use chrono::Utc;

use ketovital_core::models::{
    BeveragePayload, BeverageType, CardioType, Entry, EntryPayload, ExerciseMode, ExercisePayload,
    ExerciseSet, FastingPayload, MetricPayload, NewEntry, parse_timestamp,
};
use ketovital_core::service::VitalService;

use crate::config::RemoteSettings;

use super::sync::try_auto_sync;

async fn log_and_report<P: EntryPayload>(
    svc: &VitalService,
    settings: &RemoteSettings,
    payload: P,
    at: Option<String>,
    json: bool,
    describe: impl Fn(&Entry<P>) -> String,
) -> Result<()> {
    let mut draft = NewEntry::new(payload);
    if let Some(ts) = at {
        draft = draft.at(ts);
    }
    let entry = svc.log_entry(draft)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("{}", describe(&entry));
        println!("  id: {}", entry.id);
    }

    try_auto_sync(svc, settings, json).await;
    Ok(())
}

/// Parses `NAME:SETSxREPS` with an optional `@KG`, e.g. `Squat:3x8@60`.
pub(crate) fn parse_set(spec: &str) -> Result<ExerciseSet> {
    let Some((name, scheme)) = spec.rsplit_once(':') else {
        bail!("Invalid set '{spec}'. Use NAME:SETSxREPS[@KG], e.g. Squat:3x8@60");
    };
    let (scheme, weight) = match scheme.split_once('@') {
        Some((s, w)) => {
            let kg: f64 = w
                .trim()
                .trim_end_matches("kg")
                .parse()
                .with_context(|| format!("Invalid weight in '{spec}'"))?;
            (s, Some(kg))
        }
        None => (scheme, None),
    };
    let Some((sets, reps)) = scheme.to_lowercase().split_once('x').map(|(s, r)| {
        (s.trim().parse::<u32>(), r.trim().parse::<u32>())
    }) else {
        bail!("Invalid set scheme in '{spec}'. Use SETSxREPS, e.g. 3x8");
    };
    Ok(ExerciseSet {
        name: name.trim().to_string(),
        sets: sets.with_context(|| format!("Invalid set count in '{spec}'"))?,
        reps: reps.with_context(|| format!("Invalid rep count in '{spec}'"))?,
        weight_kg: weight,
        notes: None,
    })
}

pub(crate) struct ExerciseArgs {
    pub mode: String,
    pub cardio: Option<String>,
    pub minutes: Option<f64>,
    pub distance_km: Option<f64>,
    pub steps: Option<u32>,
    pub beep_level: Option<String>,
    pub sets: Vec<String>,
    pub routine: Option<String>,
    pub notes: Option<String>,
    pub at: Option<String>,
}

pub(crate) async fn cmd_exercise(
    svc: &VitalService,
    settings: &RemoteSettings,
    args: ExerciseArgs,
    json: bool,
) -> Result<()> {
    let mut payload = ExercisePayload::new(args.mode.parse::<ExerciseMode>()?);
    payload.cardio_type = args
        .cardio
        .as_deref()
        .map(str::parse::<CardioType>)
        .transpose()?;
    payload.minutes = args.minutes;
    payload.distance_km = args.distance_km;
    payload.steps = args.steps;
    payload.beep_test_level = args.beep_level;
    payload.routine_id = args.routine;
    payload.notes = args.notes;
    payload.exercises = args
        .sets
        .iter()
        .map(|s| parse_set(s))
        .collect::<Result<_>>()?;

    log_and_report(svc, settings, payload, args.at, json, |e| {
        let p = &e.payload;
        let mut line = format!("Logged {} session", p.mode.as_str().to_lowercase());
        if let Some(cardio) = p.cardio_type {
            line.push_str(&format!(" ({})", cardio.as_str()));
        }
        if let Some(minutes) = p.minutes {
            line.push_str(&format!(", {minutes:.0} min"));
        }
        if !p.exercises.is_empty() {
            line.push_str(&format!(", {} exercises", p.exercises.len()));
        }
        line
    })
    .await
}

pub(crate) struct MetricArgs {
    pub weight_kg: Option<f64>,
    pub waist_cm: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub stress: Option<u8>,
    pub at: Option<String>,
}

pub(crate) async fn cmd_metric(
    svc: &VitalService,
    settings: &RemoteSettings,
    args: MetricArgs,
    json: bool,
) -> Result<()> {
    let payload = MetricPayload {
        weight_kg: args.weight_kg,
        waist_cm: args.waist_cm,
        sleep_hours: args.sleep_hours,
        stress_level: args.stress,
    };
    log_and_report(svc, settings, payload, args.at, json, |e| {
        let p = &e.payload;
        let parts: Vec<String> = [
            p.weight_kg.map(|v| format!("weight {v:.1} kg")),
            p.waist_cm.map(|v| format!("waist {v:.1} cm")),
            p.sleep_hours.map(|v| format!("sleep {v:.1} h")),
            p.stress_level.map(|v| format!("stress {v}/10")),
        ]
        .into_iter()
        .flatten()
        .collect();
        format!("Logged {}", parts.join(", "))
    })
    .await
}

pub(crate) async fn cmd_fast(
    svc: &VitalService,
    settings: &RemoteSettings,
    start: Option<String>,
    end: Option<String>,
    json: bool,
) -> Result<()> {
    let start_time = match start {
        Some(s) => parse_timestamp(&s)?,
        None => Utc::now(),
    };
    let end_time = end.as_deref().map(parse_timestamp).transpose()?;
    let payload = FastingPayload {
        start_time,
        end_time,
        duration_hours: None,
    };

    log_and_report(svc, settings, payload, None, json, |e| {
        match e.payload.duration_hours {
            Some(hours) => format!("Logged fast of {hours:.1} h"),
            None => format!("Started fast at {}", e.payload.start_time.to_rfc3339()),
        }
    })
    .await
}

pub(crate) async fn cmd_beverage(
    svc: &VitalService,
    settings: &RemoteSettings,
    kind: &str,
    volume_ml: Option<f64>,
    at: Option<String>,
    json: bool,
) -> Result<()> {
    let payload = BeveragePayload {
        beverage_type: kind.parse::<BeverageType>()?,
        volume_ml,
    };
    log_and_report(svc, settings, payload, at, json, |e| {
        let name = e.payload.beverage_type.as_str();
        match e.payload.volume_ml {
            Some(ml) => format!("Logged {name} ({ml:.0} ml)"),
            None => format!("Logged {name}"),
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set() {
        let set = parse_set("Squat:3x8@60").unwrap();
        assert_eq!(set.name, "Squat");
        assert_eq!((set.sets, set.reps), (3, 8));
        assert_eq!(set.weight_kg, Some(60.0));

        let set = parse_set("Push-up: 4X15").unwrap();
        assert_eq!(set.name, "Push-up");
        assert_eq!((set.sets, set.reps), (4, 15));
        assert_eq!(set.weight_kg, None);

        assert_eq!(parse_set("Row:3x10@42.5kg").unwrap().weight_kg, Some(42.5));
    }

    #[test]
    fn test_parse_set_invalid() {
        assert!(parse_set("Squat").is_err());
        assert!(parse_set("Squat:3").is_err());
        assert!(parse_set("Squat:threex8").is_err());
        assert!(parse_set("Squat:3x8@heavy").is_err());
    }
}
