//! Interactive keyboard dismissal, driven by hand
//!
//! Run with `KEYBOARD_LOG_MODE=development` to see the tracker's logs.

use std::sync::Arc;

use keyboard_state::prelude::*;
use keyboard_state::init_logging_from_env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_from_env()?;

    let screen = Arc::new(Screen::new(390.0, 844.0));
    let views = Arc::new(ViewTree::new());
    let root = views.set_root(Rect::new(0.0, 0.0, 390.0, 844.0));
    views.add_scroll_view(root, Rect::new(0.0, 100.0, 390.0, 744.0), KeyboardDismissMode::Interactive)?;

    let center = Arc::new(NotificationCenter::new());
    let env = KeyboardEnvironment::new(DeliveryContext::new(), center.clone(), screen, views);
    let tracker = KeyboardTracker::new(env, TrackerConfig::from_env()?)?;

    let _heights = tracker
        .visible_height_stream()
        .subscribe(|height| println!("visible height: {height:.0}"));
    let _edges = tracker
        .will_show_visible_height_stream()
        .subscribe(|height| println!("keyboard will show: {height:.0}"));

    println!("-- keyboard appears");
    center.post(KeyboardNotification::will_change_frame(Rect::new(0.0, 508.0, 390.0, 336.0)).into_notification());

    if let Some(pan) = tracker.pan_recognizer() {
        println!("-- user drags the list down");
        pan.touch_began(Point::new(200.0, 400.0));
        for y in [420.0, 560.0, 640.0, 720.0] {
            pan.touch_moved(Point::new(200.0, y));
        }
        pan.touch_ended(Point::new(200.0, 720.0));
    }

    println!("-- system finishes hiding the keyboard");
    center.post(KeyboardNotification::will_hide(Some(Rect::new(0.0, 844.0, 390.0, 336.0))).into_notification());

    println!("final state: {}", serde_json::to_string(&tracker.state())?);
    Ok(())
}
