//! Loaded Vulkan library and instance

use std::ffi::{c_char, CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};
use log::{info, warn};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::config::RendererConfig;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Vulkan entry points and instance, shared by every device created from them
///
/// Wrap it in an `Arc` and hand clones to [`VulkanDevice::new`]; the
/// instance is destroyed when the last clone drops.
///
/// [`VulkanDevice::new`]: crate::render::backends::vulkan::VulkanDevice::new
pub struct VulkanLibrary {
    entry: Entry,
    instance: Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanLibrary {
    /// Load Vulkan and create an instance with the given extra instance extensions
    ///
    /// Validation layers and the debug messenger are enabled when the
    /// configuration asks for them and the layer is installed.
    pub fn new(config: &RendererConfig, extensions: &[*const c_char]) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let app_name = CString::new(config.application_name.as_str())
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid application name: {e}")))?;
        let engine_name = CString::new("entity_renderer")
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let layer_name = CString::new(VALIDATION_LAYER)
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let validation = config.enable_validation && Self::has_validation_layer(&entry)?;
        if config.enable_validation && !validation {
            warn!("Validation requested but {VALIDATION_LAYER} is not installed");
        }

        let mut extension_names = extensions.to_vec();
        let mut layer_names = Vec::new();
        if validation {
            extension_names.push(DebugUtils::name().as_ptr());
            layer_names.push(layer_name.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names);
        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(VulkanError::Api)?;

        let debug_utils = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(error) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(error);
                }
            }
        } else {
            None
        };

        info!("Vulkan instance created (validation: {validation})");
        Ok(Self { entry, instance, debug_utils })
    }

    /// Create an instance with the extensions a display needs for presentation
    pub fn for_display(config: &RendererConfig, display: RawDisplayHandle) -> VulkanResult<Self> {
        let extensions = ash_window::enumerate_required_extensions(display).map_err(VulkanError::Api)?;
        Self::new(config, extensions)
    }

    /// Create a presentation surface for a window
    ///
    /// # Safety
    ///
    /// The window and display behind the handles must outlive the returned
    /// surface and the device that takes ownership of it.
    pub unsafe fn create_surface(&self, display: RawDisplayHandle, window: RawWindowHandle) -> VulkanResult<vk::SurfaceKHR> {
        ash_window::create_surface(&self.entry, &self.instance, display, window, None).map_err(VulkanError::Api)
    }

    /// Vulkan entry points
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Whether the debug messenger is routing validation output to the log
    pub fn validation_enabled(&self) -> bool {
        self.debug_utils.is_some()
    }

    fn has_validation_layer(entry: &Entry) -> VulkanResult<bool> {
        let layers = entry.enumerate_instance_layer_properties().map_err(VulkanError::Api)?;
        Ok(layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_str() == Ok(VALIDATION_LAYER)
        }))
    }
}

impl Drop for VulkanLibrary {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }.map_err(VulkanError::Api)
}

/// Route validation layer messages into `log` at matching severity
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {message_type:?} - {message}");
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {message_type:?} - {message}");
    } else {
        log::debug!("[Vulkan] {message_type:?} - {message}");
    }

    vk::FALSE
}
