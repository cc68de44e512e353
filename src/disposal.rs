use log::debug;

use crate::registry::ViewerInstance;
use crate::render::Renderer;

/// Tears one instance down in a fixed order: pending frame, deferred
/// resume, listeners, scene resources, graphics context, canvas. The
/// registry removes the entry afterwards. Repeated calls do nothing.
pub(crate) fn dispose_instance<R: Renderer>(instance: &mut ViewerInstance<R>) {
    if instance.disposed {
        return;
    }

    if let Some(frame) = instance.scheduler.take_pending() {
        instance.binding.cancel_frame(frame);
    }
    instance.interaction.cancel_deferred_resume();
    instance.binding.hide_tooltip();
    instance.binding.detach_listeners();
    instance.root.dispose(&mut instance.renderer);
    instance.renderer.release_context();
    instance.binding.detach_canvas();
    instance.on_select = None;
    instance.disposed = true;

    debug!("disposed viewer {}", instance.id);
}
