/*!
 * Audio task timeline tests
 */

use dubsync::app_config::TimelineConfig;
use dubsync::subtitles::srt::{dub_track, render};
use dubsync::subtitles::SubtitleEntry;
use dubsync::timeline::TimelineBuilder;

fn builder(min_subtitle_duration: f64) -> TimelineBuilder {
    TimelineBuilder::new(&TimelineConfig { min_subtitle_duration })
}

#[test]
fn test_build_twoShortLinesSameSpeaker_shouldMergeIntoOne() {
    let entries = vec![
        SubtitleEntry::new("A", "first", Some("S1"), 0.0, 0.4),
        SubtitleEntry::new("B", "second", Some("S1"), 0.5, 0.8),
        SubtitleEntry::new("C", "third", Some("S1"), 3.0, 5.0),
    ];

    let outcome = builder(0.6).build(&entries);

    assert_eq!(outcome.tasks.len(), entries.len() - 1);
    assert_eq!(outcome.merged, 1);
    let merged = &outcome.tasks[0];
    assert_eq!(merged.text, "first second");
    assert_eq!(merged.origin, "A B");
    assert_eq!(merged.start_time, 0.0);
    assert_eq!(merged.end_time, 0.8);
    assert_eq!(outcome.tasks[1].number, 2);
}

#[test]
fn test_build_everyTask_shouldMeetMinimumExceptLast() {
    let entries: Vec<SubtitleEntry> = (0..8)
        .map(|i| {
            let start = i as f64 * 1.1;
            let speaker = if i % 3 == 0 { "S1" } else { "S2" };
            SubtitleEntry::new(format!("s{}", i), format!("t{}", i), Some(speaker), start, start + 0.7)
        })
        .collect();

    let outcome = builder(2.5).build(&entries);

    let (last, rest) = outcome.tasks.split_last().expect("tasks");
    assert!(rest.iter().all(|task| task.duration >= 2.5 - 1e-9));
    assert!(last.duration > 0.0);
    assert!(outcome.tasks.windows(2).all(|pair| pair[0].start_time <= pair[1].start_time));
    let numbers: Vec<usize> = outcome.tasks.iter().map(|task| task.number).collect();
    assert_eq!(numbers, (1..=outcome.tasks.len()).collect::<Vec<_>>());
}

#[test]
fn test_dubTrack_builtTimeline_shouldSpeakCleanedText() {
    let entries = vec![
        SubtitleEntry::new("Well (laughs) okay", "嗯（笑）好吧", None, 0.0, 3.0),
        SubtitleEntry::new("Next", "well-known fact", None, 4.0, 7.0),
    ];

    let outcome = builder(2.5).build(&entries);
    let srt = render(&dub_track(&outcome.tasks));

    assert_eq!(
        srt,
        "1\n00:00:00,000 --> 00:00:03,000\n嗯好吧\n\n2\n00:00:04,000 --> 00:00:07,000\nwellknown fact\n\n"
    );
}
