//! Profile command: cached copy first, then a refresh.

use anyhow::{Result, bail};
use keyline_core::controller::SessionController;
use keyline_core::models::UserProfile;
use keyline_core::profile::{ProfileReconciler, ProfileView};

pub async fn show(controller: &SessionController) -> Result<()> {
    let mut reconciler = ProfileReconciler::enter(controller)?;
    if !reconciler.has_token() {
        bail!("Not logged in. Run `keyline login` first.");
    }

    let cached = reconciler.view().user().cloned();
    if let Some(user) = &cached {
        print_profile(user);
    }

    match reconciler.refresh().await {
        ProfileView::Fresh(user) => {
            if cached.as_ref() != Some(user) {
                if cached.is_some() {
                    println!();
                    println!("Updated:");
                }
                print_profile(user);
            }
        }
        ProfileView::Cached(_) | ProfileView::Placeholder => {
            let reason = controller
                .profile_outcome()
                .failure()
                .map(str::to_string)
                .unwrap_or_default();
            eprintln!("Warning: could not refresh profile: {reason}");
            if cached.is_none() {
                println!("Profile unavailable");
            }
        }
        ProfileView::SignedOut => bail!("Session expired. Please log in again."),
    }
    Ok(())
}

fn print_profile(user: &UserProfile) {
    println!("Name:    {}", user.display_name());
    println!("Email:   {}", user.email);
    println!("ID:      {}", user.id);
    if let Some(status) = &user.status {
        println!("Status:  {status}");
    }
    if let Some(created) = user.created_at() {
        println!("Joined:  {}", created.format("%Y-%m-%d %H:%M UTC"));
    }
}
