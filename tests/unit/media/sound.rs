use std::cell::RefCell;

use super::*;

#[derive(Default)]
struct Recorder {
    played: RefCell<Vec<(String, f32)>>,
}

impl SoundOutput for Recorder {
    fn play_one_shot(&self, clip: &SoundClip, volume: f32) -> bool {
        self.played.borrow_mut().push((clip.key.clone(), volume));
        true
    }
}

fn board() -> (Rc<Recorder>, SoundBoard) {
    let out = Rc::new(Recorder::default());
    let sounds = vec![
        SoundSetting {
            key: "click".to_string(),
            clip_path: "ui/Click.OGG".to_string(),
            volume: 0.5,
        },
        SoundSetting {
            key: "loud".to_string(),
            clip_path: "boom.mp3".to_string(),
            volume: 3.0,
        },
        SoundSetting {
            key: "raw".to_string(),
            clip_path: "beep.aiff".to_string(),
            volume: 1.0,
        },
    ];
    let board = SoundBoard::from_settings(&sounds, Path::new("/content"), out.clone());
    (out, board)
}

#[test]
fn format_follows_extension() {
    let (_out, board) = board();
    assert_eq!(board.clip("click").unwrap().format, AudioFormat::Ogg);
    assert_eq!(board.clip("loud").unwrap().format, AudioFormat::Mp3);
    assert_eq!(board.clip("raw").unwrap().format, AudioFormat::Wav);
    assert_eq!(
        board.clip("click").unwrap().path,
        Path::new("/content/Audio/ui/Click.OGG")
    );
    assert_eq!(board.len(), 3);
}

#[test]
fn play_clamps_and_honors_override() {
    let (out, board) = board();
    assert!(board.play("click", None));
    assert!(board.play("loud", None));
    assert!(board.play("click", Some(-2.0)));
    assert_eq!(
        *out.played.borrow(),
        vec![
            ("click".to_string(), 0.5),
            ("loud".to_string(), 1.0),
            ("click".to_string(), 0.0),
        ]
    );
}

#[test]
fn unknown_key_plays_nothing() {
    let (out, board) = board();
    assert!(!board.play("missing", None));
    assert!(out.played.borrow().is_empty());
}
