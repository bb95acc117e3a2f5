//! # Máscara de SIGINT durante la creación de workers
//! src/workers/signal_mask.rs
//!
//! Los threads heredan la máscara de señales del thread que los crea. Si se
//! bloquea SIGINT mientras se crean los workers, ningún worker puede recibir
//! la interrupción: siempre la atiende un thread que no es worker.
//!
//! `InterruptMask::block` bloquea SIGINT en el thread actual y guarda la
//! máscara anterior; `restore` (o `Drop`) la reinstala.

use std::io;

/// Guard RAII que mantiene SIGINT bloqueado en el thread actual
#[must_use = "la máscara se restaura al soltar el guard"]
pub struct InterruptMask {
    #[cfg(unix)]
    previous: libc::sigset_t,
    active: bool,
}

impl InterruptMask {
    /// Bloquea SIGINT en el thread actual
    #[cfg(unix)]
    pub fn block() -> io::Result<Self> {
        // SAFETY: sigset_t es un tipo POD; sigemptyset/sigaddset lo inicializan
        // antes de usarlo y pthread_sigmask solo lee/escribe los punteros dados.
        unsafe {
            let mut blocked: libc::sigset_t = std::mem::zeroed();
            let mut previous: libc::sigset_t = std::mem::zeroed();

            if libc::sigemptyset(&mut blocked) != 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::sigaddset(&mut blocked, libc::SIGINT) != 0 {
                return Err(io::Error::last_os_error());
            }

            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &blocked, &mut previous);
            if rc != 0 {
                return Err(io::Error::from_raw_os_error(rc));
            }

            Ok(Self {
                previous,
                active: true,
            })
        }
    }

    #[cfg(not(unix))]
    pub fn block() -> io::Result<Self> {
        Ok(Self { active: true })
    }

    /// Reinstala la máscara anterior reportando el error, si lo hay
    pub fn restore(mut self) -> io::Result<()> {
        self.active = false;
        self.reinstall()
    }

    #[cfg(unix)]
    fn reinstall(&self) -> io::Result<()> {
        // SAFETY: `previous` fue inicializado por pthread_sigmask en `block`
        let rc = unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.previous, std::ptr::null_mut())
        };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn reinstall(&self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for InterruptMask {
    fn drop(&mut self) {
        if self.active {
            let _ = self.reinstall();
        }
    }
}

/// Indica si SIGINT está bloqueado en el thread actual
#[cfg(unix)]
pub fn interrupt_blocked() -> io::Result<bool> {
    // SAFETY: consulta de la máscara actual sin modificarla
    unsafe {
        let mut current: libc::sigset_t = std::mem::zeroed();
        let rc = libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), &mut current);
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(libc::sigismember(&current, libc::SIGINT) == 1)
    }
}
